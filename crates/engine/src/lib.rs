//! Health engine – registry, concurrent executor and aggregator for health
//! probes.
//!
//! This crate contains the whole check pipeline and no transport. The
//! `healthctl` CLI and socket daemon, or any HTTP layer, sit on top of
//! [`HealthService`] and serialize its reports through [`HealthResponse`].

pub mod aggregator;
pub mod executor;
pub mod manifest;
pub mod platform;
pub mod probes;
pub mod registry;
pub mod report;
pub mod service;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use registry::{Registry, RegistryBuilder, RegistryError, TagFilter};
pub use report::HealthResponse;
pub use service::HealthService;
pub use traits::{Probe, ProbeError, ProbeResult};
pub use types::{AggregatedReport, HealthStatus, ProbeOutcome};
