//! Combines chain snapshots and the event buffer into render-ready
//! state.

use crate::activity::{aggregate_activity, KnightActivity};
use crate::coalesce::Coalescer;
use crate::layout::{layout_steps, DanglingRef, LayoutError};
use chrono::{DateTime, Utc};
use rtd_core::{ChainRun, Event, Phase};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Trailing debounce between an event burst and recomputation.
pub const RENDER_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepVisual {
    pub name: String,
    pub knight: String,
    pub domain: String,
    pub phase: Phase,
    pub column: usize,
    pub row: usize,
    /// Running phase, or named as the chain's current step even before
    /// the phase has transitioned.
    pub active: bool,
    pub failed: bool,
    pub retried: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChainView {
    pub name: String,
    pub namespace: String,
    pub phase: Phase,
    pub current_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub columns: usize,
    pub nodes: Vec<StepVisual>,
    pub dangling: Vec<DanglingRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderState {
    pub chains: Vec<ChainView>,
    pub activity: Vec<KnightActivity>,
    pub generated_at: DateTime<Utc>,
}

/// Pure projection of chain runs plus the event buffer at `now`.
pub fn project(
    chains: &[ChainRun],
    events: &[Event],
    now: DateTime<Utc>,
) -> Result<RenderState, LayoutError> {
    let mut views = Vec::with_capacity(chains.len());
    for run in chains {
        let layout = layout_steps(&run.steps)?;
        let nodes = run
            .steps
            .iter()
            .map(|step| {
                let position = layout.position(&step.name).unwrap_or(crate::layout::Position {
                    column: 0,
                    row: 0,
                });
                StepVisual {
                    name: step.name.clone(),
                    knight: step.knight.clone(),
                    domain: step.domain.clone(),
                    phase: step.phase,
                    column: position.column,
                    row: position.row,
                    active: step.phase.is_running() || step.name == run.current_step,
                    failed: step.phase == Phase::Failed,
                    retried: step.retry_count > 0,
                }
            })
            .collect();
        views.push(ChainView {
            name: run.name.clone(),
            namespace: run.namespace.clone(),
            phase: run.phase,
            current_step: run.current_step.clone(),
            schedule: run.schedule.clone(),
            columns: layout.columns,
            nodes,
            dangling: layout.dangling,
        });
    }
    Ok(RenderState {
        chains: views,
        activity: aggregate_activity(events, now),
        generated_at: now,
    })
}

/// Debounced projection owner: feed it fresh inputs as they arrive and
/// it recomputes once per burst, `RENDER_DEBOUNCE` after the last call.
/// Dropping the projector cancels any pending recomputation.
#[derive(Default)]
pub struct Projector {
    coalescer: Coalescer,
    latest: Arc<Mutex<Option<RenderState>>>,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, chains: Vec<ChainRun>, events: Vec<Event>) {
        let latest = self.latest.clone();
        self.coalescer.schedule(RENDER_DEBOUNCE, move || {
            match project(&chains, &events, Utc::now()) {
                Ok(state) => *latest.lock().unwrap() = Some(state),
                // Keep the previous good state on a bad snapshot.
                Err(err) => warn!("projection_failed: {err}"),
            }
        });
    }

    pub fn latest(&self) -> Option<RenderState> {
        self.latest.lock().unwrap().clone()
    }
}
