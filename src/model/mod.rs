//! Design-model access.
//!
//! The matching engine does not own the chip design; it talks to it through
//! the [`DesignModel`] trait: overlap queries while scanning and committing,
//! and insertion of accepted detections. Both take `&self` so that a model
//! implementation serializes its own mutation — the engine may then share
//! one model reference between the scheduler's skip probe and the committer,
//! and callers that parallelize sessions get a single-writer discipline for
//! free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::region::Region;
use crate::template::{Orientation, TemplateId};

/// Identifier of a placement layer in the design model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub u32);

/// Unique identifier of a placed gate object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GateId(pub u64);

/// Failure reported by a design-model implementation.
///
/// Model failures abort the session: placing gates on a layer the model
/// cannot resolve would corrupt the design.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("design model: {reason}")]
pub struct ModelError {
    reason: String,
}

impl ModelError {
    /// Creates a model error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A gate placement produced by the matching engine.
#[derive(Clone, Debug, PartialEq)]
pub struct GatePlacement {
    /// Library template the placement instantiates.
    pub template: TemplateId,
    /// Flip orientation the template matched under.
    pub orientation: Orientation,
    /// Bounding box in master-raster coordinates, half-open.
    pub bounds: Region,
    /// Correlation score of the refined hit.
    pub score: f64,
}

/// Shared design model the engine reads from and commits into.
pub trait DesignModel {
    /// Returns the bounding box of some gate on `layer` overlapping `bbox`,
    /// if any.
    fn overlapping_gate(&self, layer: LayerId, bbox: &Region)
        -> Result<Option<Region>, ModelError>;

    /// Inserts a new gate on `layer` and returns its fresh identifier.
    fn place_gate(&self, layer: LayerId, placement: GatePlacement) -> Result<GateId, ModelError>;
}

/// In-memory design model used by the tests and the CLI driver.
///
/// Object identifiers are process-unique; mutation is serialized behind a
/// mutex. The overlap-check-then-insert sequence performed by the committer
/// is not atomic across the two calls — single-writer callers (one session
/// at a time, the shipped configuration) do not need it to be.
#[derive(Default)]
pub struct MemoryModel {
    next_id: AtomicU64,
    layers: Mutex<HashMap<LayerId, Vec<(GateId, GatePlacement)>>>,
}

impl MemoryModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the gates placed on `layer`.
    pub fn gates(&self, layer: LayerId) -> Vec<(GateId, GatePlacement)> {
        self.layers
            .lock()
            .expect("memory model lock")
            .get(&layer)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of gates placed on `layer`.
    pub fn gate_count(&self, layer: LayerId) -> usize {
        self.layers
            .lock()
            .expect("memory model lock")
            .get(&layer)
            .map_or(0, Vec::len)
    }
}

impl DesignModel for MemoryModel {
    fn overlapping_gate(
        &self,
        layer: LayerId,
        bbox: &Region,
    ) -> Result<Option<Region>, ModelError> {
        let layers = self.layers.lock().expect("memory model lock");
        Ok(layers.get(&layer).and_then(|gates| {
            gates
                .iter()
                .find(|(_, gate)| gate.bounds.intersects(bbox))
                .map(|(_, gate)| gate.bounds)
        }))
    }

    fn place_gate(&self, layer: LayerId, placement: GatePlacement) -> Result<GateId, ModelError> {
        let id = GateId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut layers = self.layers.lock().expect("memory model lock");
        layers.entry(layer).or_default().push((id, placement));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{DesignModel, GatePlacement, LayerId, MemoryModel};
    use crate::region::Region;
    use crate::template::{Orientation, TemplateId};

    fn placement(bounds: Region) -> GatePlacement {
        GatePlacement {
            template: TemplateId(1),
            orientation: Orientation::Normal,
            bounds,
            score: 0.95,
        }
    }

    #[test]
    fn overlap_queries_are_per_layer() {
        let model = MemoryModel::new();
        let bounds = Region::new(10, 10, 20, 20);
        model.place_gate(LayerId(0), placement(bounds)).unwrap();

        let probe = Region::new(15, 15, 25, 25);
        assert_eq!(
            model.overlapping_gate(LayerId(0), &probe).unwrap(),
            Some(bounds)
        );
        assert_eq!(model.overlapping_gate(LayerId(1), &probe).unwrap(), None);
    }

    #[test]
    fn ids_are_fresh_and_counting_works() {
        let model = MemoryModel::new();
        let a = model
            .place_gate(LayerId(0), placement(Region::new(0, 0, 5, 5)))
            .unwrap();
        let b = model
            .place_gate(LayerId(0), placement(Region::new(10, 0, 15, 5)))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(model.gate_count(LayerId(0)), 2);
        assert_eq!(model.gate_count(LayerId(3)), 0);
    }
}
