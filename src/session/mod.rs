//! Matching session orchestration.
//!
//! A [`MatchingSession`] owns everything one recognition run needs:
//! parameters, statistics, the cancellation token and the large per-run
//! resources (scale-down sibling, summation tables). It drives the coarse
//! scan on the scale-down raster, hill-climb refinement on the master
//! raster, and commits accepted detections through the design model — once
//! per template, per orientation.
//!
//! The run is a long single-threaded loop intended for a worker thread;
//! the caller keeps a [`CancelToken`] clone and may set it from any thread.
//! Cancellation is cooperative and terminal: already-committed gates stay,
//! and the report carries the statistics gathered so far.

mod commit;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::correlate::CorrelationContext;
use crate::model::{DesignModel, LayerId};
use crate::raster::pyramid::ScalePyramid;
use crate::raster::RasterView;
use crate::region::Region;
use crate::search::hill::hill_climb;
use crate::search::scan::{FreeScan, GridScan, IrregularGrid, ScanPolicy, Scanner};
use crate::tables::SummationTables;
use crate::template::{Orientation, TemplateEntry, TemplateId, ZeroMeanTemplate};
use crate::trace::{trace_event, trace_span};
use crate::util::{GateMatchError, GateMatchResult};

use commit::MatchCommitter;

/// Shared cooperative cancellation flag.
///
/// Clones observe the same flag; setting it makes every scheduler report
/// exhaustion at its next step and the session finish with
/// [`SessionOutcome::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-run matching parameters.
#[derive(Clone, Debug)]
pub struct SessionParameters {
    /// Search region in master-raster coordinates, half-open.
    pub search: Region,
    /// Layer new gates are placed on (and checked against).
    pub layer: LayerId,
    /// Scale-down factor of the coarse pass; must be a built pyramid level
    /// (a power of two). Factor 1 scans the master raster directly.
    pub scale_down: usize,
    /// Coarse score at or above which a hit enters hill climbing.
    pub tau_hill_climb: f64,
    /// Refined score at or above which a hit becomes a detection. Expected
    /// to be at least `tau_hill_climb`.
    pub tau_detect: f64,
    /// Upper bound of the adaptive scan step, in scale-down pixels.
    pub max_step: usize,
    /// Scanning policy of the coarse pass.
    pub policy: ScanPolicy,
    /// Cell-grid offsets in master coordinates; required by the grid
    /// policies.
    pub grid: Option<IrregularGrid>,
}

impl SessionParameters {
    /// Parameters with conservative defaults: scale-down 2, hill-climb entry
    /// at 0.4, acceptance at 0.7, maximum step 4, free scan.
    pub fn new(search: Region, layer: LayerId) -> Self {
        Self {
            search,
            layer,
            scale_down: 2,
            tau_hill_climb: 0.4,
            tau_detect: 0.7,
            max_step: 4,
            policy: ScanPolicy::Free,
            grid: None,
        }
    }
}

/// Counters accumulated across all templates and orientations of a run.
#[derive(Clone, Debug, Default)]
pub struct SessionStatistics {
    /// Hits whose refined score cleared the acceptance threshold, including
    /// duplicates of already-placed gates.
    pub objects_found: u64,
    /// Gates actually inserted into the design model.
    pub objects_added: u64,
    /// Real correlation evaluations performed (coarse and refining).
    pub evaluations: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Terminal state of a session run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every template and orientation was scanned to exhaustion.
    Finished,
    /// The cancellation token was observed; partial results are committed.
    Cancelled,
}

/// Result of a completed (or cancelled) session run.
#[derive(Clone, Debug)]
pub struct SessionReport {
    /// How the run ended.
    pub outcome: SessionOutcome,
    /// Counters gathered up to the terminal state.
    pub stats: SessionStatistics,
}

/// A refined hit about to be committed. Transient: produced by the scan
/// loop, consumed immediately by the committer.
pub(crate) struct MatchCandidate {
    pub(crate) score: f64,
    pub(crate) orientation: Orientation,
    pub(crate) template: TemplateId,
    pub(crate) bounds: Region,
}

/// Orchestrator of one recognition run over one or more templates.
pub struct MatchingSession {
    params: SessionParameters,
    templates: Vec<TemplateEntry>,
    cancel: CancelToken,
    progress: Option<Box<dyn Fn(f32) + Send + Sync>>,
}

impl MatchingSession {
    /// Creates a session over `templates` with a fresh cancellation token.
    pub fn new(params: SessionParameters, templates: Vec<TemplateEntry>) -> Self {
        Self {
            params,
            templates,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Returns a clone of the session's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replaces the cancellation token, e.g. to share one across sessions.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers a progress callback, invoked after each (template,
    /// orientation) pass with the completed fraction in `0.0..=1.0`.
    pub fn with_progress(mut self, progress: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Runs the session against `master`, committing detections into
    /// `model`.
    ///
    /// Fails only on precondition violations (degenerate geometry, missing
    /// pyramid level, misordered thresholds, grid policy without a grid) and
    /// on model-access failures. Finding no match is a normal, silent
    /// outcome.
    pub fn run(
        &self,
        master: RasterView<'_>,
        model: &dyn DesignModel,
    ) -> GateMatchResult<SessionReport> {
        let started = Instant::now();
        let _span = trace_span!("matching_session", templates = self.templates.len()).entered();

        self.validate(master)?;
        let factor = self.params.scale_down;
        let search = self.params.search;

        // The scale-down sibling and both table pairs are the large per-run
        // resources; they are built once here and dropped when the run ends.
        let pyramid;
        let sd = if factor == 1 {
            master
        } else {
            pyramid = ScalePyramid::build(master, factor)?;
            pyramid.sibling(factor)?
        };
        let sd_search = search.scaled_down(factor);
        if sd_search.is_empty() {
            return Err(GateMatchError::DegenerateRegion { region: sd_search });
        }
        let master_tables = SummationTables::build(master, search)?;
        let sd_tables = SummationTables::build(sd, sd_search)?;
        trace_event!(
            "tables_built",
            width = search.width(),
            height = search.height(),
            scale_down = factor
        );

        let evaluations = AtomicU64::new(0);
        let mut stats = SessionStatistics::default();
        let committer = MatchCommitter::new(model, self.params.layer);
        let total_passes = (self.templates.len() * Orientation::SWEEP.len()).max(1);
        let mut completed_passes = 0usize;

        'templates: for entry in &self.templates {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut master_tpl = ZeroMeanTemplate::from_raster(master, entry.bounds)?;
            let sd_bounds = entry.bounds.scaled_down(factor);
            if sd_bounds.is_empty() {
                return Err(GateMatchError::DegenerateRegion { region: sd_bounds });
            }
            let mut sd_tpl = ZeroMeanTemplate::from_raster(sd, sd_bounds)?;

            let master_placements = search
                .placements(master_tpl.width(), master_tpl.height())
                .ok_or(GateMatchError::TemplateLargerThanRegion {
                    template: entry.bounds,
                    search,
                })?;
            let sd_placements = sd_search
                .placements(sd_tpl.width(), sd_tpl.height())
                .ok_or(GateMatchError::TemplateLargerThanRegion {
                    template: sd_bounds,
                    search: sd_search,
                })?;

            for (idx, orientation) in Orientation::SWEEP.into_iter().enumerate() {
                // Each sweep entry differs from its predecessor by one flip,
                // applied to both zero-mean buffers in lockstep.
                match idx {
                    0 => {}
                    1 | 3 => {
                        master_tpl.flip_up_down();
                        sd_tpl.flip_up_down();
                    }
                    _ => {
                        master_tpl.flip_left_right();
                        sd_tpl.flip_left_right();
                    }
                }
                if self.cancel.is_cancelled() {
                    break 'templates;
                }
                if entry.tests_orientation(orientation) {
                    let _pass =
                        trace_span!("orientation_pass", orientation = orientation.as_str())
                            .entered();
                    self.scan_orientation(
                        OrientationPass {
                            master,
                            sd,
                            master_tables: &master_tables,
                            sd_tables: &sd_tables,
                            master_tpl: &master_tpl,
                            sd_tpl: &sd_tpl,
                            master_placements,
                            sd_placements,
                            entry,
                            orientation,
                            model,
                            committer: &committer,
                            evaluations: &evaluations,
                        },
                        &mut stats,
                    )?;
                }
                completed_passes += 1;
                if let Some(progress) = &self.progress {
                    progress(completed_passes as f32 / total_passes as f32);
                }
            }
        }

        stats.evaluations = evaluations.load(Ordering::Relaxed);
        stats.elapsed = started.elapsed();
        let outcome = if self.cancel.is_cancelled() {
            SessionOutcome::Cancelled
        } else {
            SessionOutcome::Finished
        };
        trace_event!(
            "session_done",
            found = stats.objects_found,
            added = stats.objects_added,
            evaluations = stats.evaluations
        );
        Ok(SessionReport { outcome, stats })
    }

    fn validate(&self, master: RasterView<'_>) -> GateMatchResult<()> {
        let params = &self.params;
        master.check_region(&params.search)?;
        if params.scale_down == 0 {
            return Err(GateMatchError::MissingPyramidLevel { factor: 0 });
        }
        if params.tau_detect < params.tau_hill_climb {
            return Err(GateMatchError::ThresholdOrder {
                tau_hill_climb: params.tau_hill_climb,
                tau_detect: params.tau_detect,
            });
        }
        if params.policy != ScanPolicy::Free
            && params.grid.as_ref().map_or(true, IrregularGrid::is_empty)
        {
            return Err(GateMatchError::GridUnavailable);
        }
        for entry in &self.templates {
            master.check_region(&entry.bounds)?;
        }
        Ok(())
    }

    fn scan_orientation(
        &self,
        pass: OrientationPass<'_, '_>,
        stats: &mut SessionStatistics,
    ) -> GateMatchResult<()> {
        let factor = self.params.scale_down;
        let search = self.params.search;
        let sd_search = search.scaled_down(factor);

        let sd_ctx = CorrelationContext::new(
            pass.sd,
            pass.sd_tables,
            sd_search,
            pass.sd_tpl,
            pass.evaluations,
        );
        let master_ctx = CorrelationContext::new(
            pass.master,
            pass.master_tables,
            search,
            pass.master_tpl,
            pass.evaluations,
        );

        let mut scanner = match self.params.policy {
            ScanPolicy::Free => Scanner::Free(FreeScan::new(
                pass.sd_placements,
                self.params.max_step,
                self.cancel.clone(),
            )),
            policy => {
                let grid = self
                    .params
                    .grid
                    .as_ref()
                    .ok_or(GateMatchError::GridUnavailable)?;
                Scanner::Grid(GridScan::new(
                    pass.sd_placements,
                    policy,
                    grid.scaled_down(factor),
                    pass.model,
                    self.params.layer,
                    factor,
                    (pass.master_tpl.width(), pass.master_tpl.height()),
                    self.params.max_step,
                    self.cancel.clone(),
                )?)
            }
        };

        while let Some((x, y)) = scanner.next()? {
            let score = sd_ctx.score_at(x, y);
            scanner.observe(score);

            let Some(score) = score else { continue };
            if score < self.params.tau_hill_climb {
                continue;
            }

            // Map the coarse hit into the full-resolution frame and snap it
            // onto the true correlation peak.
            let up_x = (x * factor).clamp(
                pass.master_placements.min_x,
                pass.master_placements.max_x - 1,
            );
            let up_y = (y * factor).clamp(
                pass.master_placements.min_y,
                pass.master_placements.max_y - 1,
            );
            let Some(entry_score) = master_ctx.score_at(up_x, up_y) else {
                continue;
            };
            let (best_x, best_y, best_score) = hill_climb(
                &master_ctx,
                pass.master_placements,
                up_x,
                up_y,
                entry_score,
            );
            if best_score < self.params.tau_detect {
                continue;
            }

            let candidate = MatchCandidate {
                score: best_score,
                orientation: pass.orientation,
                template: pass.entry.id,
                bounds: Region::from_size(
                    best_x,
                    best_y,
                    pass.master_tpl.width(),
                    pass.master_tpl.height(),
                ),
            };
            pass.committer.commit(&candidate, stats)?;
        }
        Ok(())
    }
}

/// Bundled read-only state of one (template, orientation) pass.
struct OrientationPass<'a, 'b> {
    master: RasterView<'a>,
    sd: RasterView<'a>,
    master_tables: &'b SummationTables,
    sd_tables: &'b SummationTables,
    master_tpl: &'b ZeroMeanTemplate,
    sd_tpl: &'b ZeroMeanTemplate,
    master_placements: Region,
    sd_placements: Region,
    entry: &'b TemplateEntry,
    orientation: Orientation,
    model: &'b dyn DesignModel,
    committer: &'b MatchCommitter<'b>,
    evaluations: &'b AtomicU64,
}
