//! Platform implementations of the capability traits used by built-in probes.
//!
//! - [`StdFilesystem`]: real std::fs operations
//! - [`ReqwestNetwork`]: TCP via tokio, HTTP via reqwest

use crate::traits::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ===========================================================================
// Filesystem – wraps std::fs
// ===========================================================================

pub struct StdFilesystem;

impl FilesystemOps for StdFilesystem {
    fn read_file(&self, path: &Path) -> ProbeResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ProbeError::PermissionDenied(format!("cannot read {}: {}", path.display(), e))
            }
            _ => ProbeError::Io(e),
        })
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> ProbeResult<()> {
        std::fs::write(path, data).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ProbeError::PermissionDenied(format!("cannot write {}: {}", path.display(), e))
            }
            _ => ProbeError::Io(e),
        })
    }

    fn create_dir_all(&self, path: &Path) -> ProbeResult<()> {
        std::fs::create_dir_all(path).map_err(ProbeError::Io)
    }

    fn remove_dir_all(&self, path: &Path) -> ProbeResult<()> {
        std::fs::remove_dir_all(path).map_err(ProbeError::Io)
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

// ===========================================================================
// Network – tokio sockets + reqwest
// ===========================================================================

pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    pub fn new() -> ProbeResult<Self> {
        install_crypto_provider();
        let client = reqwest::Client::builder()
            .user_agent(concat!("health-engine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// reqwest is built without a bundled provider; install ring once per process.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[async_trait::async_trait]
impl NetworkOps for ReqwestNetwork {
    async fn http_get(&self, url: &str, timeout: Duration) -> ProbeResult<u16> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Network(format!("GET {}: {}", url, e))
                }
            })?;
        Ok(resp.status().as_u16())
    }

    async fn tcp_connect(&self, address: &str, timeout: Duration) -> ProbeResult<SocketAddr> {
        let connect = tokio::net::TcpStream::connect(address);
        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::Network(format!("connect {}: {}", address, e)))?;
        Ok(stream.peer_addr()?)
    }
}
