pub mod assignment;
pub mod expenses;
pub mod maintenance;
pub mod transitions;
pub mod trips;

use std::time::Instant;

use crate::state::AppState;

pub(crate) fn record_outcome(state: &AppState, workflow: &str, start: Instant, ok: bool) {
    let outcome = if ok { "success" } else { "error" };
    let elapsed = start.elapsed().as_secs_f64();

    state
        .metrics
        .workflow_latency_seconds
        .with_label_values(&[workflow, outcome])
        .observe(elapsed);
    state
        .metrics
        .workflow_total
        .with_label_values(&[workflow, outcome])
        .inc();
}
