//! Normalized cross-correlation scoring.
//!
//! The denominator of the NCC formula is the windowed intensity variance
//! times the template's sum of squares; the variance comes from the
//! summation tables in O(1). The numerator is a direct dot product of the
//! window against the zero-mean template — O(template area) per candidate,
//! which is the per-position cost floor of this engine.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::raster::RasterView;
use crate::region::Region;
use crate::tables::SummationTables;
use crate::template::ZeroMeanTemplate;

/// Variance floor below which a window (or template) counts as flat.
const MIN_VARIANCE: f64 = 1e-8;

/// Everything needed to score candidate placements of one template
/// orientation against one raster variant. Read-only; cheap to construct
/// per orientation.
pub struct CorrelationContext<'a> {
    raster: RasterView<'a>,
    tables: &'a SummationTables,
    origin_x: usize,
    origin_y: usize,
    template: &'a ZeroMeanTemplate,
    evaluations: &'a AtomicU64,
}

impl<'a> CorrelationContext<'a> {
    /// Creates a scoring context. `region` is the search region the tables
    /// were built over; its top-left corner anchors the table coordinate
    /// frame.
    pub fn new(
        raster: RasterView<'a>,
        tables: &'a SummationTables,
        region: Region,
        template: &'a ZeroMeanTemplate,
        evaluations: &'a AtomicU64,
    ) -> Self {
        Self {
            raster,
            tables,
            origin_x: region.min_x,
            origin_y: region.min_y,
            template,
            evaluations,
        }
    }

    /// NCC score of the template over the window with top-left `(x, y)` in
    /// raster coordinates. The caller must keep the window inside the search
    /// region.
    ///
    /// Returns `None` when the window or the template has no variance; such
    /// positions are non-matches, never errors. Every invocation counts one
    /// real correlation evaluation toward the session statistics.
    pub fn score_at(&self, x: usize, y: usize) -> Option<f64> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let width = self.template.width();
        let height = self.template.height();
        let area = (width * height) as f64;

        let lx = x - self.origin_x;
        let ly = y - self.origin_y;
        let s1 = self
            .tables
            .window_sum(lx, ly, lx + width - 1, ly + height - 1);
        let s2 = self
            .tables
            .window_sum_sq(lx, ly, lx + width - 1, ly + height - 1);

        let window_variance = s2 - s1 * s1 / area;
        if window_variance <= MIN_VARIANCE || self.template.sum_of_squares() <= MIN_VARIANCE {
            return None;
        }

        let mut dot = 0.0f64;
        for ty in 0..height {
            let img_row = self
                .raster
                .row(y + ty)
                .expect("candidate window within raster");
            let window = &img_row[x..x + width];
            let tpl_row = self.template.row(ty);
            for (pixel, weight) in window.iter().zip(tpl_row) {
                dot += f64::from(*pixel) * weight;
            }
        }

        let score = dot / (window_variance * self.template.sum_of_squares()).sqrt();
        score.is_finite().then_some(score)
    }

    /// Template extent as `(width, height)`.
    pub fn template_size(&self) -> (usize, usize) {
        (self.template.width(), self.template.height())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::CorrelationContext;
    use crate::raster::RasterView;
    use crate::region::Region;
    use crate::tables::SummationTables;
    use crate::template::ZeroMeanTemplate;

    #[test]
    fn self_window_scores_one_and_counts_evaluations() {
        let mut data = vec![0u8; 64];
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i * 37) % 251) as u8;
        }
        let view = RasterView::from_slice(&data, 8, 8).unwrap();
        let region = Region::new(0, 0, 8, 8);
        let tables = SummationTables::build(view, region).unwrap();
        let tpl_region = Region::new(2, 3, 6, 7);
        let template = ZeroMeanTemplate::from_raster(view, tpl_region).unwrap();
        let evaluations = AtomicU64::new(0);

        let ctx = CorrelationContext::new(view, &tables, region, &template, &evaluations);
        let score = ctx.score_at(2, 3).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(evaluations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn flat_window_is_a_non_match() {
        let data = vec![42u8; 64];
        let view = RasterView::from_slice(&data, 8, 8).unwrap();
        let region = Region::new(0, 0, 8, 8);
        let tables = SummationTables::build(view, region).unwrap();
        let template = ZeroMeanTemplate::from_raster(view, Region::new(0, 0, 3, 3)).unwrap();
        let evaluations = AtomicU64::new(0);

        let ctx = CorrelationContext::new(view, &tables, region, &template, &evaluations);
        assert_eq!(ctx.score_at(1, 1), None);
        assert_eq!(evaluations.load(Ordering::Relaxed), 1);
    }
}
