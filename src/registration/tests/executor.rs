use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{AppError, AppResult, ClientError};
use crate::registration::{
    BlockingSampler, ClientFactory, ObserverEvent, OutcomeKind, ProtocolClient, RELEASE_GRACE,
    RegistrationConfig, RegistrationObserver, RegistrationParams, SampleExecutor, SampleStatus,
};

use super::{Counters, Script, ScriptedFactory, run_async_test, test_config, test_params};

const SLACK: Duration = Duration::from_millis(150);

fn executor_for(factory: &Arc<ScriptedFactory>) -> SampleExecutor {
    let factory: Arc<dyn ClientFactory> = factory.clone();
    SampleExecutor::new(factory)
}

#[test]
fn immediate_success_reports_ok() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Succeed("reg-123"));
        let config = test_config()?;
        let outcome = executor_for(&factory)
            .execute(&config, Duration::from_secs(2))
            .await;
        let checks = [
            (outcome.status() == SampleStatus::Ok, "Expected OK status"),
            (outcome.kind() == OutcomeKind::Success, "Expected Success kind"),
            (outcome.message().contains("success"), "Message lacks success"),
            (
                outcome.registration_id() == Some("reg-123"),
                "Unexpected registration id",
            ),
            (outcome.response_code() == "200", "Unexpected response code"),
            (
                outcome.payload() == b"coap://127.0.0.1:5683",
                "Payload should echo the server uri",
            ),
            (outcome.endpoint() == Some("device-"), "Unexpected endpoint"),
            (
                Counters::get(&factory.counters.stops) == 1,
                "Client should be stopped once",
            ),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(AppError::validation(message));
            }
        }
        Ok(())
    })
}

#[test]
fn rejection_reports_failed() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Reject("rejected"));
        let config = test_config()?;
        let outcome = executor_for(&factory)
            .execute(&config, Duration::from_secs(2))
            .await;
        if outcome.status() != SampleStatus::Failed
            || outcome.kind() != OutcomeKind::Rejected
            || !outcome.message().contains("rejected")
            || outcome.registration_id().is_some()
            || outcome.response_code() != "4.03"
        {
            return Err(AppError::validation(format!(
                "Unexpected outcome: {:?}",
                outcome
            )));
        }
        Ok(())
    })
}

#[test]
fn silent_client_times_out_at_deadline() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Silent);
        let config = test_config()?;
        let limit = Duration::from_secs(2);
        let started = Instant::now();
        let outcome = executor_for(&factory).execute(&config, limit).await;
        let waited = started.elapsed();
        if outcome.kind() != OutcomeKind::Timeout || outcome.status() != SampleStatus::Failed {
            return Err(AppError::validation(format!(
                "Expected timeout, got {:?}",
                outcome
            )));
        }
        if waited < limit || waited > limit.saturating_add(Duration::from_millis(500)) {
            return Err(AppError::validation(format!(
                "Timeout returned after {:?}",
                waited
            )));
        }
        if outcome.response_code() != "504" || Counters::get(&factory.counters.stops) != 1 {
            return Err(AppError::validation("Timed-out session must still be stopped"));
        }
        Ok(())
    })
}

#[test]
fn non_numeric_lifetime_fails_before_any_client() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Succeed("unused"));
        let params = RegistrationParams {
            lifetime: "abc".to_owned(),
            ..test_params()
        };
        let outcome = executor_for(&factory)
            .run_params(&params, Duration::from_secs(1))
            .await;
        if outcome.kind() != OutcomeKind::ConfigurationError
            || !outcome.message().contains("abc")
        {
            return Err(AppError::validation(format!(
                "Expected configuration error, got {:?}",
                outcome
            )));
        }
        if Counters::get(&factory.counters.builds) != 0 {
            return Err(AppError::validation("No client may be built for bad config"));
        }
        Ok(())
    })
}

#[test]
fn concurrent_samples_use_distinct_endpoints() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Succeed("reg"));
        let executor = executor_for(&factory);
        let params = RegistrationParams {
            random_suffix: true,
            ..test_params()
        };
        let (first, second) = tokio::join!(
            executor.run_params(&params, Duration::from_secs(1)),
            executor.run_params(&params, Duration::from_secs(1)),
        );
        if !first.is_success() || !second.is_success() {
            return Err(AppError::validation("Expected both samples to succeed"));
        }
        if first.endpoint() == second.endpoint() {
            return Err(AppError::validation("Concurrent endpoints collided"));
        }
        let endpoints = factory.endpoints();
        if endpoints.len() != 2 || endpoints.iter().any(|ep| !ep.starts_with("device-")) {
            return Err(AppError::validation(format!(
                "Unexpected endpoints: {:?}",
                endpoints
            )));
        }
        Ok(())
    })
}

#[test]
fn every_script_returns_within_bound() -> AppResult<()> {
    run_async_test(async {
        let limit = Duration::from_millis(100);
        let scripts = [
            Script::Succeed("a"),
            Script::Reject("b"),
            Script::Silent,
            Script::SuccessThenFailure("c"),
            Script::FailBuild,
            Script::FailStart,
            Script::Delayed {
                after: Duration::from_secs(30),
                registration_id: "d",
            },
            Script::SlowStart {
                delay: Duration::from_secs(30),
                registration_id: "e",
            },
            Script::SlowStop {
                delay: Duration::from_secs(30),
                registration_id: "f",
            },
        ];
        let config = test_config()?;
        for script in scripts {
            let factory = ScriptedFactory::new(script);
            let started = Instant::now();
            let outcome = executor_for(&factory).execute(&config, limit).await;
            let waited = started.elapsed();
            if waited > limit.saturating_add(RELEASE_GRACE).saturating_add(SLACK) {
                return Err(AppError::validation(format!(
                    "{:?} took {:?}",
                    script, waited
                )));
            }
            let stops = Counters::get(&factory.counters.stops);
            let builds = Counters::get(&factory.counters.builds);
            if builds == 1 && !matches!(script, Script::FailBuild) && stops != 1 {
                return Err(AppError::validation(format!(
                    "{:?} left its client running ({:?})",
                    script,
                    outcome.kind()
                )));
            }
        }
        Ok(())
    })
}

#[test]
fn zero_timeout_is_a_configuration_error() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::Succeed("reg"));
        let config = test_config()?;
        let outcome = executor_for(&factory).execute(&config, Duration::ZERO).await;
        if outcome.kind() != OutcomeKind::ConfigurationError
            || Counters::get(&factory.counters.builds) != 0
        {
            return Err(AppError::validation(format!(
                "Unexpected outcome: {:?}",
                outcome
            )));
        }
        Ok(())
    })
}

/// Hands its observer out so a test can fire events after the sample ended.
struct LeakyFactory {
    observer: Arc<Mutex<Option<Arc<dyn RegistrationObserver>>>>,
}

struct LeakyClient {
    observer: Arc<Mutex<Option<Arc<dyn RegistrationObserver>>>>,
}

impl ClientFactory for LeakyFactory {
    fn build(&self, _config: &RegistrationConfig) -> Result<Box<dyn ProtocolClient>, ClientError> {
        Ok(Box::new(LeakyClient {
            observer: Arc::clone(&self.observer),
        }))
    }
}

#[async_trait]
impl ProtocolClient for LeakyClient {
    fn add_observer(&mut self, observer: Arc<dyn RegistrationObserver>) {
        if let Ok(mut slot) = self.observer.lock() {
            *slot = Some(observer);
        }
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn stop(&mut self, _force: bool) {}
}

#[test]
fn late_event_after_timeout_does_not_resurrect() -> AppResult<()> {
    run_async_test(async {
        let slot = Arc::new(Mutex::new(None));
        let factory: Arc<dyn ClientFactory> = Arc::new(LeakyFactory {
            observer: Arc::clone(&slot),
        });
        let executor = SampleExecutor::new(factory);
        let config = test_config()?;
        let outcome = executor.execute(&config, Duration::from_millis(30)).await;
        if outcome.kind() != OutcomeKind::Timeout {
            return Err(AppError::validation("Expected timeout"));
        }

        let stale = slot
            .lock()
            .map_err(|_err| AppError::validation("Observer slot poisoned"))?
            .take()
            .ok_or_else(|| AppError::validation("Observer was never registered"))?;

        // The stale observer fires while the next sample is waiting.
        let (next, ()) = tokio::join!(
            executor.execute(&config, Duration::from_millis(100)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                stale.on_event(&ObserverEvent::Success {
                    registration_id: "too-late".to_owned(),
                });
            }
        );
        if next.kind() != OutcomeKind::Timeout || next.registration_id().is_some() {
            return Err(AppError::validation(format!(
                "Late event leaked into the next sample: {:?}",
                next
            )));
        }
        Ok(())
    })
}

#[test]
fn slow_client_start_is_bounded_by_timeout() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::SlowStart {
            delay: Duration::from_secs(3),
            registration_id: "reg-after-limit",
        });
        let config = test_config()?;
        let limit = Duration::from_millis(100);
        let started = Instant::now();
        let outcome = executor_for(&factory).execute(&config, limit).await;
        let waited = started.elapsed();
        if outcome.kind() != OutcomeKind::Timeout || outcome.registration_id().is_some() {
            return Err(AppError::validation(format!(
                "Slow start must time out, got {:?}",
                outcome
            )));
        }
        if waited > limit.saturating_add(RELEASE_GRACE).saturating_add(SLACK) {
            return Err(AppError::validation(format!(
                "Sample returned after {:?}",
                waited
            )));
        }
        if outcome.elapsed() > limit.saturating_add(SLACK) {
            return Err(AppError::validation(format!(
                "Reported latency {:?} exceeds the limit",
                outcome.elapsed()
            )));
        }
        if Counters::get(&factory.counters.stops) != 1 {
            return Err(AppError::validation("Overrun client must still be stopped"));
        }
        Ok(())
    })
}

#[test]
fn deregistration_is_excluded_from_latency_and_bounded() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(Script::SlowStop {
            delay: Duration::from_millis(800),
            registration_id: "reg-slow-delete",
        });
        let config = test_config()?;
        let limit = Duration::from_millis(200);
        let started = Instant::now();
        let outcome = executor_for(&factory).execute(&config, limit).await;
        let waited = started.elapsed();
        if !outcome.is_success() {
            return Err(AppError::validation(format!(
                "Expected success, got {:?}",
                outcome
            )));
        }
        if waited > limit.saturating_add(SLACK) {
            return Err(AppError::validation(format!(
                "Slow deregistration held the sample for {:?}",
                waited
            )));
        }
        if outcome.elapsed() >= Duration::from_millis(100) {
            return Err(AppError::validation(format!(
                "Latency {:?} includes teardown",
                outcome.elapsed()
            )));
        }
        if Counters::get(&factory.counters.graceful_stops) != 1 {
            return Err(AppError::validation("Deregistration should have been attempted"));
        }
        Ok(())
    })
}

#[test]
fn blocking_sampler_runs_one_sample() -> AppResult<()> {
    let factory = ScriptedFactory::new(Script::Succeed("reg-blocking"));
    let sampler = BlockingSampler::new(executor_for(&factory).with_label("blocking"))?;
    let config = test_config()?;
    let outcome = sampler.run_one_sample(&config, Duration::from_secs(2));
    if !outcome.is_success()
        || outcome.registration_id() != Some("reg-blocking")
        || outcome.label() != "blocking"
    {
        return Err(AppError::validation(format!(
            "Unexpected blocking outcome: {:?}",
            outcome
        )));
    }
    let invalid = RegistrationParams {
        port: "nope".to_owned(),
        ..test_params()
    };
    let outcome = sampler.run_params(&invalid, Duration::from_secs(2));
    if outcome.kind() != OutcomeKind::ConfigurationError {
        return Err(AppError::validation("Expected configuration error"));
    }
    Ok(())
}
