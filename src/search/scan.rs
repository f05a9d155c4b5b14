//! Candidate position scheduling.
//!
//! Two scanning policies cover the search region. The free scan walks the
//! placement range in raster order with an adaptive step: the step shrinks
//! toward 1 as the correlation rises, so promising neighborhoods are sampled
//! densely while flat background is crossed quickly. The grid-aligned scans
//! snap one axis to the standard-cell grid and additionally skip regions
//! already covered by a placed gate, so annotated rows are not re-scanned.
//!
//! Schedulers poll the session's cancellation token before every step and
//! simply report exhaustion once it is set; the session distinguishes
//! cancellation from a completed scan by re-checking the token.

use crate::model::{DesignModel, LayerId};
use crate::region::Region;
use crate::session::CancelToken;
use crate::util::{GateMatchError, GateMatchResult};

/// Scanning policy for the coarse pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Raster-order scan of the whole placement range with adaptive step.
    Free,
    /// Rows of the standard-cell grid: `y` snaps to grid offsets, `x` scans.
    GridRows,
    /// Columns of the standard-cell grid: `x` snaps to grid offsets, `y`
    /// scans.
    GridCols,
}

/// Irregular grid offsets along one axis, sorted ascending.
#[derive(Clone, Debug, Default)]
pub struct IrregularGrid {
    offsets: Vec<usize>,
}

impl IrregularGrid {
    /// Creates a grid from offsets in any order; duplicates collapse.
    pub fn new(mut offsets: Vec<usize>) -> Self {
        offsets.sort_unstable();
        offsets.dedup();
        Self { offsets }
    }

    /// Returns true when the grid has no offsets.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Maps every offset into a raster scaled down by `factor`.
    pub fn scaled_down(&self, factor: usize) -> IrregularGrid {
        IrregularGrid::new(self.offsets.iter().map(|o| o / factor).collect())
    }

    fn at_or_after(&self, from: usize) -> Option<usize> {
        let idx = self.offsets.partition_point(|&o| o < from);
        self.offsets.get(idx).copied()
    }

    fn after(&self, offset: usize) -> Option<usize> {
        self.at_or_after(offset + 1)
    }
}

/// Step size after observing a candidate's score: linear interpolation from
/// `max_step` (score 0) down to 1 (score 1), reset to `max_step` for
/// non-positive or non-numeric scores.
pub(crate) fn adaptive_step(score: Option<f64>, max_step: usize) -> usize {
    match score {
        Some(s) if s > 0.0 => {
            let interpolated = (1.0 - max_step as f64) * s + max_step as f64;
            interpolated.round().max(1.0) as usize
        }
        _ => max_step,
    }
}

/// Free raster-order scan with adaptive step.
pub struct FreeScan {
    placements: Region,
    max_step: usize,
    step: usize,
    x: usize,
    y: usize,
    started: bool,
    cancel: CancelToken,
}

impl FreeScan {
    /// Creates a scan over the half-open placement region.
    pub fn new(placements: Region, max_step: usize, cancel: CancelToken) -> Self {
        let max_step = max_step.max(1);
        Self {
            placements,
            max_step,
            step: max_step,
            x: placements.min_x,
            y: placements.min_y,
            started: false,
            cancel,
        }
    }

    /// Returns the next candidate position, or `None` when the region is
    /// exhausted or cancellation was requested.
    pub fn next(&mut self) -> Option<(usize, usize)> {
        if self.cancel.is_cancelled() {
            return None;
        }
        if !self.started {
            self.started = true;
        } else {
            self.x += self.step;
            if self.x >= self.placements.max_x {
                self.x = self.placements.min_x;
                self.y += self.step;
            }
        }
        if self.y >= self.placements.max_y {
            return None;
        }
        Some((self.x, self.y))
    }

    /// Feeds back the score of the last candidate to adapt the step.
    pub fn observe(&mut self, score: Option<f64>) {
        self.step = adaptive_step(score, self.max_step);
    }
}

/// Scan axis of a grid-aligned policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GridAxis {
    Rows,
    Cols,
}

/// Grid-aligned scan that snaps one axis to the cell grid and skips regions
/// already covered by placed gates.
///
/// The scheduler works in the coordinate frame of the raster being scanned
/// (usually the scale-down sibling); `factor` converts candidate windows
/// into master coordinates for the model overlap probe, and gate extents
/// back.
pub struct GridScan<'a> {
    placements: Region,
    axis: GridAxis,
    grid: IrregularGrid,
    model: &'a dyn DesignModel,
    layer: LayerId,
    factor: usize,
    template: (usize, usize),
    max_step: usize,
    step: usize,
    snapped: Option<usize>,
    free: usize,
    started: bool,
    cancel: CancelToken,
}

impl<'a> GridScan<'a> {
    /// Creates a grid-aligned scan. `policy` must be one of the grid
    /// policies; an empty grid is an error, never a silent free-scan
    /// fallback. `template` is the template extent in master coordinates.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        placements: Region,
        policy: ScanPolicy,
        grid: IrregularGrid,
        model: &'a dyn DesignModel,
        layer: LayerId,
        factor: usize,
        template: (usize, usize),
        max_step: usize,
        cancel: CancelToken,
    ) -> GateMatchResult<Self> {
        let axis = match policy {
            ScanPolicy::GridRows => GridAxis::Rows,
            ScanPolicy::GridCols => GridAxis::Cols,
            ScanPolicy::Free => return Err(GateMatchError::GridUnavailable),
        };
        if grid.is_empty() {
            return Err(GateMatchError::GridUnavailable);
        }
        let max_step = max_step.max(1);
        Ok(Self {
            placements,
            axis,
            grid,
            model,
            layer,
            factor: factor.max(1),
            template,
            max_step,
            step: max_step,
            snapped: None,
            free: placements.min_x,
            started: false,
            cancel,
        })
    }

    fn free_bounds(&self) -> (usize, usize) {
        match self.axis {
            GridAxis::Rows => (self.placements.min_x, self.placements.max_x),
            GridAxis::Cols => (self.placements.min_y, self.placements.max_y),
        }
    }

    fn snap_bounds(&self) -> (usize, usize) {
        match self.axis {
            GridAxis::Rows => (self.placements.min_y, self.placements.max_y),
            GridAxis::Cols => (self.placements.min_x, self.placements.max_x),
        }
    }

    /// Returns the next candidate position, or `None` when the grid is
    /// exhausted or cancellation was requested. Model probes can fail, which
    /// aborts the scan with an error.
    pub fn next(&mut self) -> GateMatchResult<Option<(usize, usize)>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        let (free_min, free_max) = self.free_bounds();
        let (snap_min, snap_max) = self.snap_bounds();

        if !self.started {
            self.started = true;
            self.free = free_min;
            self.snapped = self.grid.at_or_after(snap_min);
        } else {
            self.free += self.step;
        }

        loop {
            let Some(snapped) = self.snapped else {
                return Ok(None);
            };
            if snapped >= snap_max {
                self.snapped = None;
                return Ok(None);
            }
            if self.free >= free_max {
                self.snapped = self.grid.after(snapped);
                self.free = free_min;
                continue;
            }

            let (x, y) = match self.axis {
                GridAxis::Rows => (self.free, snapped),
                GridAxis::Cols => (snapped, self.free),
            };
            let window = Region::from_size(
                x * self.factor,
                y * self.factor,
                self.template.0,
                self.template.1,
            );
            if let Some(gate) = self.model.overlapping_gate(self.layer, &window)? {
                // Jump past the placed gate's extent along the scan axis.
                let gate_end = match self.axis {
                    GridAxis::Rows => gate.max_x,
                    GridAxis::Cols => gate.max_y,
                };
                self.free = gate_end.div_ceil(self.factor).max(self.free + 1);
                continue;
            }
            return Ok(Some((x, y)));
        }
    }

    /// Feeds back the score of the last candidate to adapt the step.
    pub fn observe(&mut self, score: Option<f64>) {
        self.step = adaptive_step(score, self.max_step);
    }
}

/// Policy dispatch used by the session loop.
pub(crate) enum Scanner<'a> {
    Free(FreeScan),
    Grid(GridScan<'a>),
}

impl Scanner<'_> {
    pub(crate) fn next(&mut self) -> GateMatchResult<Option<(usize, usize)>> {
        match self {
            Scanner::Free(scan) => Ok(scan.next()),
            Scanner::Grid(scan) => scan.next(),
        }
    }

    pub(crate) fn observe(&mut self, score: Option<f64>) {
        match self {
            Scanner::Free(scan) => scan.observe(score),
            Scanner::Grid(scan) => scan.observe(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{adaptive_step, IrregularGrid};

    #[test]
    fn adaptive_step_interpolates_between_max_and_one() {
        assert_eq!(adaptive_step(None, 5), 5);
        assert_eq!(adaptive_step(Some(-0.3), 5), 5);
        assert_eq!(adaptive_step(Some(0.0), 5), 5);
        assert_eq!(adaptive_step(Some(1.0), 5), 1);
        // (1 - 5) * 0.5 + 5 = 3
        assert_eq!(adaptive_step(Some(0.5), 5), 3);
        assert_eq!(adaptive_step(Some(1.0), 1), 1);
    }

    #[test]
    fn irregular_grid_sorts_and_searches() {
        let grid = IrregularGrid::new(vec![30, 10, 20, 20]);
        assert_eq!(grid.at_or_after(0), Some(10));
        assert_eq!(grid.at_or_after(10), Some(10));
        assert_eq!(grid.at_or_after(11), Some(20));
        assert_eq!(grid.after(20), Some(30));
        assert_eq!(grid.after(30), None);
    }

    #[test]
    fn grid_scaling_floors_offsets() {
        let grid = IrregularGrid::new(vec![10, 11, 25]);
        let scaled = grid.scaled_down(2);
        assert_eq!(scaled.at_or_after(0), Some(5));
        assert_eq!(scaled.after(5), Some(12));
    }
}
