//! Built-in probes – self, filesystem, http, tcp.
//!
//! Each probe reaches the OS only through the capability traits so tests can
//! swap in fakes.

use crate::traits::*;
use crate::types::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Self probe
// ---------------------------------------------------------------------------

/// Liveness probe: the process is able to run a task at all.
pub struct SelfProbe {
    started: Instant,
}

impl SelfProbe {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SelfProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Probe for SelfProbe {
    async fn check(&self) -> ProbeResult<ProbeOutcome> {
        Ok(ProbeOutcome::healthy()
            .with_data("uptime_s", self.started.elapsed().as_secs())
            .with_data("pid", std::process::id())
            .with_data("os", current_os())
            .with_data("arch", std::env::consts::ARCH))
    }
}

// ---------------------------------------------------------------------------
// Filesystem probe
// ---------------------------------------------------------------------------

/// Writes a file into the temp directory and reads it back.
pub struct FilesystemProbe {
    fs: Arc<dyn FilesystemOps>,
}

impl FilesystemProbe {
    pub fn new(fs: Arc<dyn FilesystemOps>) -> Self {
        Self { fs }
    }

    fn run(&self) -> ProbeResult<ProbeOutcome> {
        let run_id = new_run_id();
        let tmp_dir = self
            .fs
            .temp_dir()
            .join(format!("health_probe_{}", &run_id[..8]));
        let payload = b"health-engine filesystem probe";

        self.fs.create_dir_all(&tmp_dir)?;
        let test_file = tmp_dir.join("probe_test.txt");
        let result = self
            .fs
            .write_file(&test_file, payload)
            .and_then(|_| self.fs.read_file(&test_file));
        let _ = self.fs.remove_dir_all(&tmp_dir);

        let data = result?;
        let outcome = if data == payload {
            ProbeOutcome::healthy()
        } else {
            ProbeOutcome::unhealthy("read-back data does not match written data")
        };
        Ok(outcome.with_data("temp_dir", tmp_dir.display().to_string()))
    }
}

#[async_trait::async_trait]
impl Probe for FilesystemProbe {
    async fn check(&self) -> ProbeResult<ProbeOutcome> {
        let probe = Self {
            fs: Arc::clone(&self.fs),
        };
        match tokio::task::spawn_blocking(move || probe.run()).await {
            Ok(result) => result,
            Err(e) => Err(ProbeError::Other(format!("filesystem probe task: {}", e))),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP probe
// ---------------------------------------------------------------------------

/// GETs a URL: 2xx is Healthy, 5xx Unhealthy, anything else Degraded.
pub struct HttpProbe {
    network: Arc<dyn NetworkOps>,
    url: String,
    request_timeout: Duration,
}

impl HttpProbe {
    pub fn new(network: Arc<dyn NetworkOps>, url: impl Into<String>) -> Self {
        Self {
            network,
            url: url.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> ProbeResult<ProbeOutcome> {
        let code = self.network.http_get(&self.url, self.request_timeout).await?;
        let outcome = match code {
            200..=299 => ProbeOutcome::healthy(),
            500..=599 => ProbeOutcome::unhealthy(format!("{} returned HTTP {}", self.url, code)),
            _ => ProbeOutcome::degraded(format!("{} returned HTTP {}", self.url, code)),
        };
        Ok(outcome
            .with_data("url", self.url.clone())
            .with_data("http_status", code))
    }
}

// ---------------------------------------------------------------------------
// TCP probe
// ---------------------------------------------------------------------------

/// Connects to `host:port` – the usual stand-in for "can we reach the
/// database". A successful but slow connect is reported as Degraded.
pub struct TcpProbe {
    network: Arc<dyn NetworkOps>,
    address: String,
    connect_timeout: Duration,
    degraded_after: Option<Duration>,
}

impl TcpProbe {
    pub fn new(network: Arc<dyn NetworkOps>, address: impl Into<String>) -> Self {
        Self {
            network,
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            degraded_after: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_degraded_after(mut self, threshold: Duration) -> Self {
        self.degraded_after = Some(threshold);
        self
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn check(&self) -> ProbeResult<ProbeOutcome> {
        let start = Instant::now();
        let peer = match self
            .network
            .tcp_connect(&self.address, self.connect_timeout)
            .await
        {
            Ok(peer) => peer,
            Err(ProbeError::Network(msg)) => {
                return Ok(ProbeOutcome::failed(ErrorCode::NetworkError, msg)
                    .with_data("address", self.address.clone()));
            }
            Err(ProbeError::Timeout) => {
                return Ok(ProbeOutcome::timed_out(self.connect_timeout)
                    .with_data("address", self.address.clone()));
            }
            Err(e) => return Err(e),
        };
        let latency = start.elapsed();

        let outcome = match self.degraded_after {
            Some(threshold) if latency > threshold => ProbeOutcome::degraded(format!(
                "connect took {}ms (threshold {}ms)",
                latency.as_millis(),
                threshold.as_millis()
            )),
            _ => ProbeOutcome::healthy(),
        };
        Ok(outcome
            .with_data("address", self.address.clone())
            .with_data("peer", peer.to_string())
            .with_data("connect_ms", as_millis_f64(latency)))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
