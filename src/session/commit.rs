//! Committing refined detections into the design model.

use crate::model::{DesignModel, GatePlacement, LayerId};
use crate::session::{MatchCandidate, SessionStatistics};
use crate::trace::trace_event;
use crate::util::GateMatchResult;

/// Inserts accepted detections, skipping positions that are already
/// annotated in the model.
pub(crate) struct MatchCommitter<'a> {
    model: &'a dyn DesignModel,
    layer: LayerId,
}

impl<'a> MatchCommitter<'a> {
    pub(crate) fn new(model: &'a dyn DesignModel, layer: LayerId) -> Self {
        Self { model, layer }
    }

    /// Records the detection and inserts a gate unless one already overlaps
    /// the candidate's bounding box on the target layer. Returns true when a
    /// gate was inserted.
    ///
    /// An overlapping gate is a silent no-op: the hit still counts as found,
    /// the model is left untouched. Model failures propagate and abort the
    /// session.
    pub(crate) fn commit(
        &self,
        candidate: &MatchCandidate,
        stats: &mut SessionStatistics,
    ) -> GateMatchResult<bool> {
        stats.objects_found += 1;

        if self
            .model
            .overlapping_gate(self.layer, &candidate.bounds)?
            .is_some()
        {
            trace_event!(
                "duplicate_skipped",
                x = candidate.bounds.min_x,
                y = candidate.bounds.min_y
            );
            return Ok(false);
        }

        let placement = GatePlacement {
            template: candidate.template,
            orientation: candidate.orientation,
            bounds: candidate.bounds,
            score: candidate.score,
        };
        self.model.place_gate(self.layer, placement)?;
        stats.objects_added += 1;
        trace_event!(
            "gate_committed",
            x = candidate.bounds.min_x,
            y = candidate.bounds.min_y,
            score = candidate.score
        );
        Ok(true)
    }
}
