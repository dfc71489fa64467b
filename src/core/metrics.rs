use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) const VIOLATIONS_TOTAL: &str = "proctor_violations_total";
pub(crate) const DISQUALIFICATIONS_TOTAL: &str = "proctor_disqualifications_total";
pub(crate) const GATE_CORRECTIONS_TOTAL: &str = "proctor_gate_corrections_total";
pub(crate) const SUBMISSIONS_FAILED_TOTAL: &str = "proctor_submissions_failed_total";
pub(crate) const RESULTS_SUBMISSIONS_TOTAL: &str = "results_submissions_total";

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(VIOLATIONS_TOTAL, "Violations counted against candidates");
    metrics::describe_counter!(DISQUALIFICATIONS_TOTAL, "Candidates disqualified");
    metrics::describe_counter!(GATE_CORRECTIONS_TOTAL, "Unauthorized navigations reverted");
    metrics::describe_counter!(SUBMISSIONS_FAILED_TOTAL, "Progress submissions that failed");
    metrics::describe_counter!(RESULTS_SUBMISSIONS_TOTAL, "Submissions merged into results");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
