//! Scale-down pyramid for the coarse scanning pass.
//!
//! The pyramid holds the master raster plus power-of-two reductions of it,
//! each produced by a 2x2 box filter with integer rounding
//! (`dst = (a + b + c + d + 2) / 4`). A matching session asks for the
//! sibling at its configured scale-down factor; factors that were never
//! built are a precondition violation, not a silent fallback.

use crate::raster::{OwnedRaster, RasterView};
use crate::util::{GateMatchError, GateMatchResult};

/// Owned multi-resolution stack of a raster. Level `k` is scaled down by
/// `2^k` relative to the base.
pub struct ScalePyramid {
    levels: Vec<OwnedRaster>,
}

impl ScalePyramid {
    /// Builds levels for factors `1, 2, 4, ...` up to `max_factor`, stopping
    /// early once a level becomes too small to halve.
    pub fn build(base: RasterView<'_>, max_factor: usize) -> GateMatchResult<Self> {
        let mut levels = vec![OwnedRaster::from_view(base)?];
        let mut factor = 1usize;
        while factor
            .checked_mul(2)
            .is_some_and(|next| next <= max_factor)
        {
            let src = levels.last().expect("pyramid has a base level").view();
            if src.width() < 2 || src.height() < 2 {
                break;
            }
            levels.push(downsample_half(src)?);
            factor *= 2;
        }
        Ok(Self { levels })
    }

    /// Returns the scale-down sibling for `factor`, which must be a built
    /// power-of-two level.
    pub fn sibling(&self, factor: usize) -> GateMatchResult<RasterView<'_>> {
        if factor == 0 || !factor.is_power_of_two() {
            return Err(GateMatchError::MissingPyramidLevel { factor });
        }
        let level = factor.trailing_zeros() as usize;
        self.levels
            .get(level)
            .map(|raster| raster.view())
            .ok_or(GateMatchError::MissingPyramidLevel { factor })
    }

    /// Returns the number of built levels (the base level counts).
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

fn downsample_half(src: RasterView<'_>) -> GateMatchResult<OwnedRaster> {
    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    let mut dst = Vec::with_capacity(dst_width * dst_height);

    for y in 0..dst_height {
        let row0 = src.row(y * 2).expect("source row below height");
        let row1 = src.row(y * 2 + 1).expect("source row below height");
        for x in 0..dst_width {
            let sum = u16::from(row0[2 * x])
                + u16::from(row0[2 * x + 1])
                + u16::from(row1[2 * x])
                + u16::from(row1[2 * x + 1]);
            dst.push(((sum + 2) / 4) as u8);
        }
    }

    OwnedRaster::new(dst, dst_width, dst_height)
}
