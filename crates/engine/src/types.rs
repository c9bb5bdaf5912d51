use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Health status – severity ordered
// ---------------------------------------------------------------------------

/// Tri-state health result.
///
/// Variants are declared in severity order so the derived `Ord` gives
/// `Healthy < Degraded < Unhealthy`; the overall status of a report is the
/// maximum over its entries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }

    /// Healthy and Degraded still accept traffic; Unhealthy does not.
    pub fn is_available(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error detail carried inside outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    ProbeFailure,
    ProbePanic,
    Unsupported,
    DependencyMissing,
    PermissionDenied,
    NetworkError,
    IoError,
    InvalidInput,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

// ---------------------------------------------------------------------------
// Probe outcome
// ---------------------------------------------------------------------------

/// Result of a single probe execution.
///
/// Probes build one with [`ProbeOutcome::healthy`] and friends; the executor
/// stamps `duration` (and `error` for faults) before handing it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Free-form, probe-specific facts (addresses, latencies, versions).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl ProbeOutcome {
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            description: None,
            duration: Duration::ZERO,
            error: None,
            data: BTreeMap::new(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(HealthStatus::Healthy)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded).with_description(description)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy).with_description(description)
    }

    /// Outcome manufactured when the executor gives up waiting.
    pub fn timed_out(limit: Duration) -> Self {
        let mut o = Self::unhealthy("timed out");
        o.error = Some(ErrorInfo {
            code: ErrorCode::Timeout,
            message: format!("probe did not complete within {}ms", limit.as_millis()),
        });
        o
    }

    /// Outcome for a probe that returned an error or panicked.
    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut o = Self::unhealthy(message.clone());
        o.error = Some(ErrorInfo { code, message });
        o
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregated report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub outcome: ProbeOutcome,
}

/// Per-request view over the selected probes. Built fresh for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub overall_status: HealthStatus,
    /// Registration order, never completion order.
    pub entries: Vec<ReportEntry>,
    #[serde(with = "duration_ms")]
    pub total_duration: Duration,
}

impl AggregatedReport {
    pub fn get(&self, name: &str) -> Option<&ProbeOutcome> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.outcome)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Durations travel as floating-point milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(as_millis_f64(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::from_nanos((ms * 1_000_000.0) as u64))
    }

    pub fn as_millis_f64(d: Duration) -> f64 {
        d.as_nanos() as f64 / 1_000_000.0
    }
}

pub use duration_ms::as_millis_f64;

/// Generate a new run ID (UUIDv4) for tracing a single query.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macos",
        "linux" => "linux",
        "windows" => "windows",
        other => other,
    }
}
