use crate::types::{ErrorCode, ProbeOutcome};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type for probe and capability operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProbeError::Unsupported(_) => ErrorCode::Unsupported,
            ProbeError::DependencyMissing(_) => ErrorCode::DependencyMissing,
            ProbeError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ProbeError::Io(_) => ErrorCode::IoError,
            ProbeError::Network(_) => ErrorCode::NetworkError,
            ProbeError::Timeout => ErrorCode::Timeout,
            ProbeError::Other(_) => ErrorCode::ProbeFailure,
        }
    }
}

// ---------------------------------------------------------------------------
// Probe capability
// ---------------------------------------------------------------------------

/// A single health test.
///
/// `check` may be called any number of times, possibly concurrently from
/// several in-flight queries, so implementations must not rely on exclusive
/// access to their own state.
///
/// The executor stops waiting once a probe's timeout elapses and drops the
/// future. Work that is not cancel-safe, or that blocks a thread, keeps
/// running in the background; probes talking to slow dependencies should
/// bound that work themselves (e.g. a client-side request timeout).
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> ProbeResult<ProbeOutcome>;
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

pub trait FilesystemOps: Send + Sync {
    fn read_file(&self, path: &Path) -> ProbeResult<Vec<u8>>;
    fn write_file(&self, path: &Path, data: &[u8]) -> ProbeResult<()>;
    fn create_dir_all(&self, path: &Path) -> ProbeResult<()>;
    fn remove_dir_all(&self, path: &Path) -> ProbeResult<()>;
    fn temp_dir(&self) -> PathBuf;
}

// ---------------------------------------------------------------------------
// Network operations
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait NetworkOps: Send + Sync {
    /// Perform an HTTP(S) GET and return the status code.
    async fn http_get(&self, url: &str, timeout: Duration) -> ProbeResult<u16>;

    /// Open (and immediately drop) a TCP connection; returns the peer address.
    async fn tcp_connect(&self, address: &str, timeout: Duration) -> ProbeResult<SocketAddr>;
}
