//! Query entry point: select → execute → aggregate.

use crate::aggregator::aggregate;
use crate::executor::execute;
use crate::registry::{Registry, TagFilter, Tags};
use crate::types::{new_run_id, AggregatedReport};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Conventional tag for self-only liveness probes.
pub const LIVE_TAG: &str = "live";
/// Conventional tag for probes that gate accepting traffic.
pub const READY_TAG: &str = "ready";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle used by transports. Cloning is cheap; the registry is
/// immutable so any number of queries may run at once.
#[derive(Clone, Debug)]
pub struct HealthService {
    registry: Registry,
    default_timeout: Duration,
}

impl HealthService {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run every probe whose tags satisfy `predicate` and aggregate the
    /// results. Never fails: probe errors and timeouts become report entries.
    pub async fn query<P>(&self, predicate: P) -> AggregatedReport
    where
        P: Fn(&Tags) -> bool,
    {
        let selected = self.registry.select(predicate);
        let span = tracing::info_span!("health_query", run_id = %new_run_id(), probes = selected.len());

        async {
            let start = Instant::now();
            let outcomes = execute(&selected, self.default_timeout).await;
            let names = selected.iter().map(|r| r.name().to_string());
            let report = aggregate(names.zip(outcomes), start.elapsed());
            tracing::info!(
                status = %report.overall_status,
                total_ms = report.total_duration.as_millis() as u64,
                "health query finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    pub async fn query_filter(&self, filter: &TagFilter) -> AggregatedReport {
        self.query(|tags| filter.matches(tags)).await
    }

    pub async fn live(&self) -> AggregatedReport {
        self.query_filter(&TagFilter::tag(LIVE_TAG)).await
    }

    pub async fn ready(&self) -> AggregatedReport {
        self.query_filter(&TagFilter::tag(READY_TAG)).await
    }
}
