//! Probe registry.
//!
//! Probes are registered by name during startup through a [`RegistryBuilder`];
//! the finished [`Registry`] is immutable and cheap to share between
//! concurrent queries.

use crate::traits::{Probe, ProbeResult};
use crate::types::ProbeOutcome;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub type Tags = BTreeSet<String>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate probe name: {0}")]
    DuplicateName(String),
    #[error("invalid probe name: {0:?}")]
    InvalidName(String),
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A probe together with the metadata it was registered under.
#[derive(Clone)]
pub struct Registration {
    name: String,
    tags: Tags,
    timeout: Option<Duration>,
    probe: Arc<dyn Probe>,
}

impl Registration {
    pub fn new<I, S>(name: impl Into<String>, tags: I, probe: Arc<dyn Probe>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
            timeout: None,
            probe,
        }
    }

    /// Override the executor's default timeout for this probe only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn probe(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.probe)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Adapts a synchronous closure into a [`Probe`].
///
/// The closure runs on tokio's blocking pool so it can freely block on I/O
/// without stalling sibling probes. A blocking closure cannot be interrupted:
/// after a timeout it keeps its thread until it returns on its own.
pub struct FnProbe<F> {
    f: Arc<F>,
}

impl<F> FnProbe<F>
where
    F: Fn() -> ProbeResult<ProbeOutcome> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait::async_trait]
impl<F> Probe for FnProbe<F>
where
    F: Fn() -> ProbeResult<ProbeOutcome> + Send + Sync + 'static,
{
    async fn check(&self) -> ProbeResult<ProbeOutcome> {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || (*f)()).await {
            Ok(result) => result,
            // Re-raise so the executor reports it like any other probe panic.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(crate::traits::ProbeError::Other(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tag filters
// ---------------------------------------------------------------------------

/// Serializable tag predicate used by the CLI and daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFilter {
    /// Every registered probe.
    All,
    /// Probes carrying the given tag.
    Tag(String),
    /// Probes carrying at least one of the given tags.
    AnyOf(Vec<String>),
    /// Probes carrying every one of the given tags.
    AllOf(Vec<String>),
}

impl TagFilter {
    pub fn tag(tag: impl Into<String>) -> Self {
        TagFilter::Tag(tag.into())
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Tag(t) => tags.contains(t),
            TagFilter::AnyOf(ts) => ts.iter().any(|t| tags.contains(t)),
            TagFilter::AllOf(ts) => ts.iter().all(|t| tags.contains(t)),
        }
    }
}

impl std::fmt::Display for TagFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagFilter::All => f.write_str("*"),
            TagFilter::Tag(t) => f.write_str(t),
            TagFilter::AnyOf(ts) => write!(f, "any({})", ts.join(",")),
            TagFilter::AllOf(ts) => write!(f, "all({})", ts.join(",")),
        }
    }
}

/// Predicate selecting probes that carry `tag`.
pub fn has_tag(tag: &str) -> impl Fn(&Tags) -> bool + '_ {
    move |tags: &Tags| tags.contains(tag)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
    names: HashSet<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe. Fails if the name is empty or already taken.
    pub fn add(&mut self, registration: Registration) -> Result<&mut Self, RegistryError> {
        if registration.name.trim().is_empty() {
            return Err(RegistryError::InvalidName(registration.name));
        }
        if !self.names.insert(registration.name.clone()) {
            return Err(RegistryError::DuplicateName(registration.name));
        }
        tracing::debug!(
            probe = %registration.name,
            tags = ?registration.tags,
            "registered probe"
        );
        self.registrations.push(registration);
        Ok(self)
    }

    pub fn register<I, S>(
        &mut self,
        name: &str,
        tags: I,
        probe: impl Probe + 'static,
    ) -> Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(Registration::new(name, tags, Arc::new(probe)))
    }

    /// Register a synchronous closure as a probe.
    pub fn register_fn<I, S, F>(
        &mut self,
        name: &str,
        tags: I,
        f: F,
    ) -> Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn() -> ProbeResult<ProbeOutcome> + Send + Sync + 'static,
    {
        self.register(name, tags, FnProbe::new(f))
    }

    pub fn build(self) -> Registry {
        Registry {
            registrations: self.registrations.into(),
        }
    }
}

/// Immutable, registration-ordered set of probes.
#[derive(Clone, Debug)]
pub struct Registry {
    registrations: Arc<[Registration]>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Probes whose tag set satisfies `predicate`, in registration order.
    pub fn select<P>(&self, predicate: P) -> Vec<Registration>
    where
        P: Fn(&Tags) -> bool,
    {
        self.registrations
            .iter()
            .filter(|r| predicate(&r.tags))
            .cloned()
            .collect()
    }

    pub fn select_filter(&self, filter: &TagFilter) -> Vec<Registration> {
        self.select(|tags| filter.matches(tags))
    }

    pub fn list(&self) -> Vec<(&str, &Tags)> {
        self.registrations
            .iter()
            .map(|r| (r.name.as_str(), &r.tags))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        RegistryBuilder::new().build()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
