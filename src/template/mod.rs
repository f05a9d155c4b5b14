//! Gate templates and their flip orientations.
//!
//! A template is not stored by this crate; the library keeps only a
//! reference to its known placement region in the master raster and
//! re-extracts the pixel content when a session starts. Orientation handling
//! follows the classic trick for axis-aligned standard cells: instead of
//! re-extracting and re-normalizing per orientation, the zero-mean buffer is
//! flipped in place, which leaves the mean and the sum of squares untouched.

mod plan;

pub use plan::ZeroMeanTemplate;

use crate::region::Region;

/// Identifier of a gate template in the surrounding library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub u64);

/// The four axis-flip orientations evaluated for each template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Template as extracted.
    Normal,
    /// Rows reversed.
    FlippedUpDown,
    /// Rows and columns reversed.
    FlippedBoth,
    /// Columns reversed.
    FlippedLeftRight,
}

impl Orientation {
    /// Sweep order. Consecutive entries differ by a single in-place flip:
    /// up/down, then left/right, then up/down again.
    pub const SWEEP: [Orientation; 4] = [
        Orientation::Normal,
        Orientation::FlippedUpDown,
        Orientation::FlippedBoth,
        Orientation::FlippedLeftRight,
    ];

    /// Short stable name, used in reports and trace output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::FlippedUpDown => "flipped_up_down",
            Orientation::FlippedBoth => "flipped_both",
            Orientation::FlippedLeftRight => "flipped_left_right",
        }
    }
}

/// A library template selected for a matching session.
#[derive(Clone, Debug)]
pub struct TemplateEntry {
    /// Library identifier carried into committed placements.
    pub id: TemplateId,
    /// Known placement of the template in master-raster coordinates; the
    /// matching sub-image is re-extracted from here.
    pub bounds: Region,
    /// Orientations to evaluate, in sweep order. Orientations outside
    /// [`Orientation::SWEEP`] order are still evaluated at their sweep slot.
    pub orientations: Vec<Orientation>,
}

impl TemplateEntry {
    /// Creates an entry that tests all four orientations.
    pub fn new(id: TemplateId, bounds: Region) -> Self {
        Self {
            id,
            bounds,
            orientations: Orientation::SWEEP.to_vec(),
        }
    }

    /// Restricts the entry to a subset of orientations.
    pub fn with_orientations(mut self, orientations: Vec<Orientation>) -> Self {
        self.orientations = orientations;
        self
    }

    pub(crate) fn tests_orientation(&self, orientation: Orientation) -> bool {
        self.orientations.contains(&orientation)
    }
}
