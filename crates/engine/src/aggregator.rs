//! Combine per-probe outcomes into one report.

use crate::types::{AggregatedReport, HealthStatus, ProbeOutcome, ReportEntry};
use std::time::Duration;

/// Overall status is the most severe entry status; no entries is `Healthy`.
pub fn overall_status<'a, I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a HealthStatus>,
{
    statuses.into_iter().copied().max().unwrap_or_default()
}

/// Build a report from `(name, outcome)` pairs, keeping their order.
pub fn aggregate<I>(outcomes: I, elapsed_total: Duration) -> AggregatedReport
where
    I: IntoIterator<Item = (String, ProbeOutcome)>,
{
    let entries: Vec<ReportEntry> = outcomes
        .into_iter()
        .map(|(name, outcome)| ReportEntry { name, outcome })
        .collect();

    AggregatedReport {
        overall_status: overall_status(entries.iter().map(|e| &e.outcome.status)),
        entries,
        total_duration: elapsed_total,
    }
}
