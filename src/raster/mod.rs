//! Raster buffers for chip-layer imagery.
//!
//! `RasterView` is a borrowed 2D grayscale view into a 1D byte buffer with an
//! explicit stride (elements between row starts, so padded rows are
//! representable). Rasters are immutable for the lifetime of a matching
//! session; the session reads the master raster and a scale-down sibling
//! through this one accessor type.

use crate::region::Region;
use crate::util::{GateMatchError, GateMatchResult};

#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;

/// Borrowed grayscale raster view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct RasterView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> RasterView<'a> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [u8], width: usize, height: usize) -> GateMatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> GateMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(GateMatchError::InvalidDimensions { width, height });
        }
        if stride < width {
            return Err(GateMatchError::InvalidStride { width, stride });
        }
        let needed = (height - 1)
            .checked_mul(stride)
            .and_then(|v| v.checked_add(width))
            .ok_or(GateMatchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(GateMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the raster width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the raster height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the intensity at `(x, y)` if it is within bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x).copied()
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }

    /// Returns true when `region` lies entirely inside the raster.
    pub fn contains_region(&self, region: &Region) -> bool {
        region.max_x <= self.width && region.max_y <= self.height
    }

    /// Checks that `region` is non-empty and inside the raster.
    pub(crate) fn check_region(&self, region: &Region) -> GateMatchResult<()> {
        if region.is_empty() {
            return Err(GateMatchError::DegenerateRegion { region: *region });
        }
        if !self.contains_region(region) {
            return Err(GateMatchError::RegionOutOfBounds {
                region: *region,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Owned contiguous grayscale raster.
pub struct OwnedRaster {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedRaster {
    /// Creates a raster from a contiguous buffer of exactly `width * height`
    /// bytes.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> GateMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(GateMatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(GateMatchError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(GateMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Copies a (possibly strided) view into an owned contiguous raster.
    pub fn from_view(view: RasterView<'_>) -> GateMatchResult<Self> {
        let width = view.width();
        let height = view.height();
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = view.row(y).expect("row index below view height");
            data.extend_from_slice(row);
        }
        Self::new(data, width, height)
    }

    /// Returns the raster width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the raster height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns a borrowed view of the raster.
    pub fn view(&self) -> RasterView<'_> {
        RasterView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}
