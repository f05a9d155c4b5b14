//! Error types for gatematch.

use thiserror::Error;

use crate::model::ModelError;
use crate::region::Region;

/// Result alias for gatematch operations.
pub type GateMatchResult<T> = std::result::Result<T, GateMatchError>;

/// Errors that can occur while preparing or running a matching session.
///
/// Numerical degeneracies during scoring (a flat window or flat template) are
/// not errors; they surface as `None` scores and the affected positions are
/// simply not candidates. Cancellation is likewise not an error but a
/// first-class session outcome.
#[derive(Debug, Error, PartialEq)]
pub enum GateMatchError {
    /// A raster was constructed with a zero width or height.
    #[error("invalid raster dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A raster stride is smaller than its width.
    #[error("stride {stride} is smaller than width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// A raster buffer is too short for the declared geometry.
    #[error("raster buffer too small: needed {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A region does not fit inside the raster it was applied to.
    #[error("region {region} lies outside a {width}x{height} raster")]
    RegionOutOfBounds {
        region: Region,
        width: usize,
        height: usize,
    },
    /// A region with zero area was used as a scan or template extent.
    #[error("degenerate region {region}")]
    DegenerateRegion { region: Region },
    /// The template extent exceeds the search region.
    #[error("template {template} does not fit into search region {search}")]
    TemplateLargerThanRegion { template: Region, search: Region },
    /// The requested scale-down factor has no pyramid level.
    #[error("no pyramid level for scale-down factor {factor}")]
    MissingPyramidLevel { factor: usize },
    /// The acceptance threshold is below the hill-climb entry threshold.
    #[error("acceptance threshold {tau_detect} is below hill-climb threshold {tau_hill_climb}")]
    ThresholdOrder { tau_hill_climb: f64, tau_detect: f64 },
    /// A grid-aligned scan policy was requested without usable grid offsets.
    #[error("grid-aligned scan requested but no grid offsets are available")]
    GridUnavailable,
    /// The design model rejected an access.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Loading an image file failed.
    #[cfg(feature = "image-io")]
    #[error("image i/o failed: {reason}")]
    ImageIo { reason: String },
}
