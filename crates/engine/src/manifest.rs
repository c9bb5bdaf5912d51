//! Probe manifests – declare built-in probes in YAML (or any serde source)
//! and turn them into a [`Registry`].

use crate::probes::{FilesystemProbe, HttpProbe, SelfProbe, TcpProbe};
use crate::registry::{Registration, Registry, RegistryError};
use crate::traits::{FilesystemOps, NetworkOps};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to parse probe manifest YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("probe {name:?}: {message}")]
    Invalid { name: String, message: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ProbeKind,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Overrides the service-wide probe timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeKind {
    #[serde(rename = "self")]
    SelfCheck,
    Filesystem,
    Http {
        url: String,
    },
    Tcp {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        degraded_after_ms: Option<u64>,
    },
}

/// The capabilities built-in probes are constructed with.
#[derive(Clone)]
pub struct Capabilities {
    pub fs: Arc<dyn FilesystemOps>,
    pub network: Arc<dyn NetworkOps>,
}

pub fn load_manifest(yaml: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_yaml::from_str(yaml)?)
}

impl ProbeSpec {
    fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |message: &str| ManifestError::Invalid {
            name: self.name.clone(),
            message: message.to_string(),
        };
        if self.timeout_ms == Some(0) {
            return Err(invalid("timeout_ms must be greater than zero"));
        }
        match &self.kind {
            ProbeKind::Http { url } if !(url.starts_with("http://") || url.starts_with("https://")) => {
                Err(invalid("url must start with http:// or https://"))
            }
            ProbeKind::Tcp { address, .. } if !address.contains(':') => {
                Err(invalid("address must be host:port"))
            }
            _ => Ok(()),
        }
    }

    pub fn to_registration(&self, caps: &Capabilities) -> Result<Registration, ManifestError> {
        self.validate()?;
        let request_timeout = self.timeout_ms.map(Duration::from_millis);
        let probe: Arc<dyn crate::traits::Probe> = match &self.kind {
            ProbeKind::SelfCheck => Arc::new(SelfProbe::new()),
            ProbeKind::Filesystem => Arc::new(FilesystemProbe::new(Arc::clone(&caps.fs))),
            ProbeKind::Http { url } => {
                let mut p = HttpProbe::new(Arc::clone(&caps.network), url.clone());
                if let Some(t) = request_timeout {
                    p = p.with_request_timeout(t);
                }
                Arc::new(p)
            }
            ProbeKind::Tcp {
                address,
                degraded_after_ms,
            } => {
                let mut p = TcpProbe::new(Arc::clone(&caps.network), address.clone());
                if let Some(t) = request_timeout {
                    p = p.with_connect_timeout(t);
                }
                if let Some(ms) = degraded_after_ms {
                    p = p.with_degraded_after(Duration::from_millis(*ms));
                }
                Arc::new(p)
            }
        };

        let mut reg = Registration::new(self.name.clone(), self.tags.iter().cloned(), probe);
        if let Some(t) = request_timeout {
            reg = reg.with_timeout(t);
        }
        Ok(reg)
    }
}

impl Manifest {
    /// Build a registry in manifest order. Duplicate names abort the build.
    pub fn build_registry(&self, caps: &Capabilities) -> Result<Registry, ManifestError> {
        let mut builder = Registry::builder();
        for spec in &self.probes {
            builder.add(spec.to_registration(caps)?)?;
        }
        Ok(builder.build())
    }
}

/// Self probe tagged `live`, filesystem probe tagged `ready`.
pub fn default_manifest() -> Manifest {
    Manifest {
        probes: vec![
            ProbeSpec {
                name: "self".into(),
                kind: ProbeKind::SelfCheck,
                tags: vec!["live".into()],
                timeout_ms: None,
            },
            ProbeSpec {
                name: "filesystem".into(),
                kind: ProbeKind::Filesystem,
                tags: vec!["ready".into()],
                timeout_ms: None,
            },
        ],
    }
}
