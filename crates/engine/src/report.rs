//! Wire shape of a health report – the stable output contract.
//!
//! ```json
//! {
//!   "status": "Unhealthy",
//!   "checks": [
//!     { "name": "db", "status": "Unhealthy", "description": "connection refused", "duration_ms": 12.4 }
//!   ],
//!   "totalDuration_ms": 12.9
//! }
//! ```

use crate::types::{as_millis_f64, AggregatedReport, ErrorInfo, HealthStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<CheckEntry>,
    #[serde(rename = "totalDuration_ms")]
    pub total_duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub name: String,
    pub status: HealthStatus,
    pub description: Option<String>,
    pub duration_ms: f64,
    /// Only present in detailed responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Only present in detailed responses.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl HealthResponse {
    /// Like `From<&AggregatedReport>`, but also carries each check's error
    /// detail and probe data.
    pub fn detailed(report: &AggregatedReport) -> Self {
        let mut resp = Self::from(report);
        for (check, entry) in resp.checks.iter_mut().zip(&report.entries) {
            check.error = entry.outcome.error.clone();
            check.data = entry.outcome.data.clone();
        }
        resp
    }

    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        status_code(self.status)
    }
}

impl From<&AggregatedReport> for HealthResponse {
    fn from(report: &AggregatedReport) -> Self {
        Self {
            status: report.overall_status,
            checks: report
                .entries
                .iter()
                .map(|e| CheckEntry {
                    name: e.name.clone(),
                    status: e.outcome.status,
                    description: e.outcome.description.clone(),
                    duration_ms: as_millis_f64(e.outcome.duration),
                    error: None,
                    data: BTreeMap::new(),
                })
                .collect(),
            total_duration_ms: as_millis_f64(report.total_duration),
        }
    }
}

/// Healthy and Degraded map to 200, Unhealthy to 503.
pub fn status_code(status: HealthStatus) -> u16 {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => 200,
        HealthStatus::Unhealthy => 503,
    }
}
