//! Intensity summation tables for O(1) windowed sums.
//!
//! A correlation scan evaluates tens of thousands of candidate windows per
//! template and orientation; computing the window variance naively would cost
//! O(window area) each time. The tables hold inclusive prefix sums of the
//! intensity and the squared intensity over the search region, so any
//! rectangular window sum reduces to at most four lookups by
//! inclusion-exclusion. Tables are built once per session per raster variant
//! and are read-only afterward.
//!
//! All query coordinates are region-local: the top-left corner of the search
//! region is `(0, 0)`.

use crate::raster::RasterView;
use crate::region::Region;
use crate::util::GateMatchResult;

/// Prefix-sum tables of intensity and squared intensity over a search region.
#[derive(Debug)]
pub struct SummationTables {
    width: usize,
    height: usize,
    sums: Vec<f64>,
    squares: Vec<f64>,
}

impl SummationTables {
    /// Builds both tables over `region` of `raster`.
    ///
    /// `table[y * width + x]` holds the sum over `[0..=x] x [0..=y]` in
    /// region-local coordinates. Fails on an empty region or one that leaves
    /// the raster; both are precondition violations.
    pub fn build(raster: RasterView<'_>, region: Region) -> GateMatchResult<Self> {
        raster.check_region(&region)?;

        let width = region.width();
        let height = region.height();
        let mut sums = vec![0.0f64; width * height];
        let mut squares = vec![0.0f64; width * height];

        for y in 0..height {
            let row = raster
                .row(region.min_y + y)
                .expect("region checked against raster bounds");
            let mut run = 0.0f64;
            let mut run_sq = 0.0f64;
            for x in 0..width {
                let v = f64::from(row[region.min_x + x]);
                run += v;
                run_sq += v * v;
                let idx = y * width + x;
                if y == 0 {
                    sums[idx] = run;
                    squares[idx] = run_sq;
                } else {
                    sums[idx] = run + sums[idx - width];
                    squares[idx] = run_sq + squares[idx - width];
                }
            }
        }

        Ok(Self {
            width,
            height,
            sums,
            squares,
        })
    }

    /// Returns the table width (the search region width).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the table height (the search region height).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of intensities over the inclusive window `[x0..=x1] x [y0..=y1]`
    /// in region-local coordinates.
    pub fn window_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        self.window(&self.sums, x0, y0, x1, y1)
    }

    /// Sum of squared intensities over the same inclusive window.
    pub fn window_sum_sq(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        self.window(&self.squares, x0, y0, x1, y1)
    }

    fn window(&self, table: &[f64], x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        debug_assert!(x0 <= x1 && y0 <= y1);
        debug_assert!(x1 < self.width && y1 < self.height);

        // Row 0 and column 0 have no subtraction term.
        let mut sum = table[y1 * self.width + x1];
        if x0 > 0 {
            sum -= table[y1 * self.width + (x0 - 1)];
        }
        if y0 > 0 {
            sum -= table[(y0 - 1) * self.width + x1];
        }
        if x0 > 0 && y0 > 0 {
            sum += table[(y0 - 1) * self.width + (x0 - 1)];
        }
        sum
    }
}
