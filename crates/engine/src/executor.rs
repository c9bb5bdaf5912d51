//! Concurrent probe execution with per-probe timeouts and fault isolation.

use crate::registry::Registration;
use crate::types::{ErrorCode, ProbeOutcome};
use futures::future::join_all;
use std::any::Any;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

/// Run every probe in `probes` concurrently and return one outcome per probe,
/// in input order.
///
/// Each probe is spawned as its own task, so a panic or a hang in one never
/// reaches its siblings. A probe that outlives its timeout (its registration
/// override, or `per_probe_timeout`) is reported as timed out and its task is
/// aborted; anything it was doing on a blocking thread keeps running until it
/// returns by itself.
pub async fn execute(probes: &[Registration], per_probe_timeout: Duration) -> Vec<ProbeOutcome> {
    let units = probes.iter().map(|reg| {
        let limit = reg.timeout().unwrap_or(per_probe_timeout);
        run_one(reg, limit)
    });
    join_all(units).await
}

async fn run_one(reg: &Registration, limit: Duration) -> ProbeOutcome {
    let name = reg.name();
    let probe = reg.probe();
    let start = Instant::now();

    let mut handle = tokio::spawn(async move { probe.check().await });

    let outcome = match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(Ok(outcome))) => {
            tracing::debug!(probe = %name, status = %outcome.status, "probe completed");
            outcome
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(probe = %name, error = %e, "probe failed");
            ProbeOutcome::failed(e.error_code(), e.to_string())
        }
        Ok(Err(join_err)) => {
            let outcome = join_error_outcome(join_err);
            tracing::warn!(
                probe = %name,
                error = outcome.description.as_deref().unwrap_or_default(),
                "probe task aborted"
            );
            outcome
        }
        Err(_) => {
            handle.abort();
            tracing::warn!(probe = %name, timeout_ms = limit.as_millis() as u64, "probe timed out");
            ProbeOutcome::timed_out(limit)
        }
    };

    // The executor owns timing; whatever the probe put there is overwritten.
    outcome.with_duration(start.elapsed())
}

fn join_error_outcome(err: JoinError) -> ProbeOutcome {
    if err.is_panic() {
        let message = panic_message(err.into_panic().as_ref());
        ProbeOutcome::failed(ErrorCode::ProbePanic, format!("probe panicked: {}", message))
    } else {
        ProbeOutcome::failed(ErrorCode::InternalError, format!("probe task cancelled: {}", err))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::traits::{Probe, ProbeError, ProbeResult};
    use crate::types::HealthStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Sleepy {
        delay: Duration,
        status: HealthStatus,
    }

    #[async_trait::async_trait]
    impl Probe for Sleepy {
        async fn check(&self) -> ProbeResult<ProbeOutcome> {
            tokio::time::sleep(self.delay).await;
            Ok(ProbeOutcome::new(self.status))
        }
    }

    struct Never;

    #[async_trait::async_trait]
    impl Probe for Never {
        async fn check(&self) -> ProbeResult<ProbeOutcome> {
            std::future::pending::<()>().await;
            Ok(ProbeOutcome::healthy())
        }
    }

    struct Panics;

    #[async_trait::async_trait]
    impl Probe for Panics {
        async fn check(&self) -> ProbeResult<ProbeOutcome> {
            panic!("boom");
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Probe for Counting {
        async fn check(&self) -> ProbeResult<ProbeOutcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeOutcome::healthy())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_outputs_follow_input_order() {
        let mut b = Registry::builder();
        b.register(
            "a",
            ["ready"],
            Sleepy {
                delay: Duration::from_millis(150),
                status: HealthStatus::Degraded,
            },
        )
        .unwrap();
        b.register(
            "b",
            ["ready"],
            Sleepy {
                delay: Duration::from_millis(5),
                status: HealthStatus::Healthy,
            },
        )
        .unwrap();
        let probes = b.build().select(|_| true);

        let outcomes = execute(&probes, TIMEOUT).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, HealthStatus::Degraded);
        assert_eq!(outcomes[1].status, HealthStatus::Healthy);
        assert!(outcomes[0].duration >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_runs_concurrently() {
        let mut b = Registry::builder();
        for name in ["p1", "p2", "p3", "p4"] {
            b.register(
                name,
                ["ready"],
                Sleepy {
                    delay: Duration::from_millis(200),
                    status: HealthStatus::Healthy,
                },
            )
            .unwrap();
        }
        let probes = b.build().select(|_| true);

        let start = Instant::now();
        let outcomes = execute(&probes, TIMEOUT).await;
        assert_eq!(outcomes.len(), 4);
        // Serial execution would take 800ms.
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_and_bounded() {
        let mut b = Registry::builder();
        b.register("stuck", ["ready"], Never).unwrap();
        b.register_fn("quick", ["ready"], || Ok(ProbeOutcome::healthy()))
            .unwrap();
        let probes = b.build().select(|_| true);

        let limit = Duration::from_millis(100);
        let start = Instant::now();
        let outcomes = execute(&probes, limit).await;
        let elapsed = start.elapsed();

        assert!(elapsed < limit + Duration::from_millis(400), "took {:?}", elapsed);
        assert_eq!(outcomes[0].status, HealthStatus::Unhealthy);
        assert_eq!(outcomes[0].description.as_deref(), Some("timed out"));
        assert_eq!(outcomes[0].error.as_ref().unwrap().code, ErrorCode::Timeout);
        assert!(outcomes[0].duration >= limit);
        assert_eq!(outcomes[1].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_registration_timeout_overrides_default() {
        let mut b = Registry::builder();
        b.add(
            crate::registry::Registration::new(
                "slow",
                ["ready"],
                Arc::new(Sleepy {
                    delay: Duration::from_millis(300),
                    status: HealthStatus::Healthy,
                }),
            )
            .with_timeout(Duration::from_millis(50)),
        )
        .unwrap();
        let probes = b.build().select(|_| true);

        let outcomes = execute(&probes, TIMEOUT).await;
        assert_eq!(outcomes[0].status, HealthStatus::Unhealthy);
        assert_eq!(outcomes[0].error.as_ref().unwrap().code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_faults_are_isolated() {
        let mut b = Registry::builder();
        b.register_fn("errors", ["ready"], || {
            Err(ProbeError::Network("connection refused".into()))
        })
        .unwrap();
        b.register("panics", ["ready"], Panics).unwrap();
        b.register_fn("panics_blocking", ["ready"], || -> ProbeResult<ProbeOutcome> {
            panic!("blocking boom")
        })
        .unwrap();
        b.register_fn("fine", ["ready"], || Ok(ProbeOutcome::degraded("slow disk")))
            .unwrap();
        let probes = b.build().select(|_| true);

        let outcomes = execute(&probes, TIMEOUT).await;
        assert_eq!(outcomes.len(), 4);

        let err = outcomes[0].error.as_ref().unwrap();
        assert_eq!(outcomes[0].status, HealthStatus::Unhealthy);
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.message.contains("connection refused"));

        assert_eq!(outcomes[1].status, HealthStatus::Unhealthy);
        assert_eq!(outcomes[1].error.as_ref().unwrap().code, ErrorCode::ProbePanic);
        assert!(outcomes[1].description.as_deref().unwrap().contains("boom"));

        assert_eq!(outcomes[2].status, HealthStatus::Unhealthy);
        assert!(outcomes[2]
            .description
            .as_deref()
            .unwrap()
            .contains("blocking boom"));

        assert_eq!(outcomes[3].status, HealthStatus::Degraded);
        assert_eq!(outcomes[3].description.as_deref(), Some("slow disk"));
        assert!(outcomes[3].error.is_none());
    }

    #[tokio::test]
    async fn test_probe_runs_once_per_execution() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut b = Registry::builder();
        b.register("counted", ["live"], Counting(Arc::clone(&counter)))
            .unwrap();
        let probes = b.build().select(|_| true);

        execute(&probes, TIMEOUT).await;
        execute(&probes, TIMEOUT).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcomes = execute(&[], TIMEOUT).await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_panic_message_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic payload");
    }
}
