//! Zero-mean template extraction.

use crate::raster::RasterView;
use crate::region::Region;
use crate::util::GateMatchResult;

/// Template sub-image with its mean intensity subtracted, plus the cached
/// sum of squares of the zero-mean values (the template-side normalization
/// constant of the correlation formula).
///
/// A flat template yields `sum_of_squares == 0`; that is not an error here —
/// the correlation evaluator reports every position of such a template as a
/// non-match.
pub struct ZeroMeanTemplate {
    width: usize,
    height: usize,
    values: Vec<f64>,
    sum_of_squares: f64,
}

impl ZeroMeanTemplate {
    /// Extracts the sub-image at `region` and centers it on its mean.
    pub fn from_raster(raster: RasterView<'_>, region: Region) -> GateMatchResult<Self> {
        raster.check_region(&region)?;

        let width = region.width();
        let height = region.height();
        let count = (width * height) as f64;

        let mut sum = 0.0f64;
        for y in 0..height {
            let row = raster
                .row(region.min_y + y)
                .expect("region checked against raster bounds");
            for x in 0..width {
                sum += f64::from(row[region.min_x + x]);
            }
        }
        let mean = sum / count;

        let mut values = Vec::with_capacity(width * height);
        let mut sum_of_squares = 0.0f64;
        for y in 0..height {
            let row = raster
                .row(region.min_y + y)
                .expect("region checked against raster bounds");
            for x in 0..width {
                let centered = f64::from(row[region.min_x + x]) - mean;
                sum_of_squares += centered * centered;
                values.push(centered);
            }
        }

        Ok(Self {
            width,
            height,
            values,
            sum_of_squares,
        })
    }

    /// Returns the template width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the template height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the cached sum of squares of the zero-mean values.
    pub fn sum_of_squares(&self) -> f64 {
        self.sum_of_squares
    }

    /// Returns row `y` of the zero-mean buffer.
    pub fn row(&self, y: usize) -> &[f64] {
        let start = y * self.width;
        &self.values[start..start + self.width]
    }

    /// Reverses the row order in place. The mean and sum of squares are
    /// permutation-invariant, so the cached statistics stay valid.
    pub fn flip_up_down(&mut self) {
        let (width, height) = (self.width, self.height);
        for y in 0..height / 2 {
            let (top, rest) = self.values.split_at_mut((height - 1 - y) * width);
            let top_row = &mut top[y * width..(y + 1) * width];
            top_row.swap_with_slice(&mut rest[..width]);
        }
    }

    /// Reverses each row in place; statistics stay valid as for
    /// [`flip_up_down`](Self::flip_up_down).
    pub fn flip_left_right(&mut self) {
        for row in self.values.chunks_exact_mut(self.width) {
            row.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ZeroMeanTemplate;
    use crate::raster::RasterView;
    use crate::region::Region;

    fn plan_2x2() -> ZeroMeanTemplate {
        let data = vec![0u8, 1, 2, 3];
        let view = RasterView::from_slice(&data, 2, 2).unwrap();
        ZeroMeanTemplate::from_raster(view, Region::new(0, 0, 2, 2)).unwrap()
    }

    #[test]
    fn extraction_centers_on_the_mean() {
        let plan = plan_2x2();
        assert_eq!(plan.row(0), &[-1.5, -0.5]);
        assert_eq!(plan.row(1), &[0.5, 1.5]);
        assert!((plan.sum_of_squares() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn flips_permute_without_touching_statistics() {
        let mut plan = plan_2x2();
        let ssq = plan.sum_of_squares();

        plan.flip_up_down();
        assert_eq!(plan.row(0), &[0.5, 1.5]);
        assert_eq!(plan.row(1), &[-1.5, -0.5]);
        assert_eq!(plan.sum_of_squares(), ssq);

        plan.flip_left_right();
        assert_eq!(plan.row(0), &[1.5, 0.5]);
        assert_eq!(plan.row(1), &[-0.5, -1.5]);
        assert_eq!(plan.sum_of_squares(), ssq);
    }

    #[test]
    fn double_flip_is_identity() {
        let mut plan = plan_2x2();
        plan.flip_up_down();
        plan.flip_up_down();
        assert_eq!(plan.row(0), &[-1.5, -0.5]);

        plan.flip_left_right();
        plan.flip_left_right();
        assert_eq!(plan.row(1), &[0.5, 1.5]);
    }

    #[test]
    fn odd_height_flip_keeps_middle_row() {
        let data: Vec<u8> = (0u8..6).collect();
        let view = RasterView::from_slice(&data, 2, 3).unwrap();
        let mut plan = ZeroMeanTemplate::from_raster(view, Region::new(0, 0, 2, 3)).unwrap();
        let middle = plan.row(1).to_vec();
        plan.flip_up_down();
        assert_eq!(plan.row(1), middle.as_slice());
    }

    #[test]
    fn flat_template_has_zero_sum_of_squares() {
        let data = vec![7u8; 9];
        let view = RasterView::from_slice(&data, 3, 3).unwrap();
        let plan = ZeroMeanTemplate::from_raster(view, Region::new(0, 0, 3, 3)).unwrap();
        assert_eq!(plan.sum_of_squares(), 0.0);
    }
}
