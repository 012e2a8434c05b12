use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::client::ClientFactory;
use super::config::RegistrationConfig;
use super::outcome::{RegistrationOutcome, SampleContext};
use super::params::{RegistrationParams, assemble_config};
use super::session::{RegistrationSession, Teardown, sample_deadline};

pub const DEFAULT_SAMPLE_LABEL: &str = "lwm2m-register";

/// Runs one registration per call and always hands back an outcome.
#[derive(Clone)]
pub struct SampleExecutor {
    factory: Arc<dyn ClientFactory>,
    teardown: Teardown,
    label: String,
}

impl SampleExecutor {
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            teardown: Teardown::Deregister,
            label: DEFAULT_SAMPLE_LABEL.to_owned(),
        }
    }

    #[must_use]
    pub const fn with_teardown(mut self, teardown: Teardown) -> Self {
        self.teardown = teardown;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registers once with `config`, waiting at most `limit` for the result.
    ///
    /// `limit` covers client start, the registration itself and teardown, so
    /// the call returns within `limit` plus [`super::RELEASE_GRACE`]. The
    /// reported latency stops at the terminal event and excludes teardown.
    /// The session is stopped before returning on every path. If the future
    /// is dropped mid-sample the session's client is dropped with it, which
    /// aborts its tasks.
    pub async fn execute(&self, config: &RegistrationConfig, limit: Duration) -> RegistrationOutcome {
        let started = Instant::now();
        if limit.is_zero() {
            return RegistrationOutcome::configuration_error(
                "sample timeout must be > 0",
                &self.label,
                started.elapsed(),
            );
        }

        let server_uri = config.server_uri();
        let deadline = sample_deadline(limit);
        let mut session =
            RegistrationSession::start(self.factory.as_ref(), config, self.teardown, deadline)
                .await;
        let completion = session.await_terminal().await;
        let elapsed = started.elapsed();
        session.stop().await;

        let context = SampleContext {
            label: &self.label,
            endpoint: &config.endpoint,
            server_uri: &server_uri,
            limit,
        };
        let outcome = RegistrationOutcome::from_completion(completion, &context, elapsed);
        if outcome.is_success() {
            debug!(
                endpoint = %config.endpoint,
                elapsed_ms = outcome.elapsed_ms(),
                "Registration succeeded"
            );
        } else {
            debug!(
                endpoint = %config.endpoint,
                kind = outcome.kind().as_str(),
                message = outcome.message(),
                "Registration failed"
            );
        }
        outcome
    }

    /// Assembles a fresh config from `params`, then runs [`Self::execute`].
    ///
    /// Invalid parameters produce a configuration-error outcome before any
    /// client is built.
    pub async fn run_params(&self, params: &RegistrationParams, limit: Duration) -> RegistrationOutcome {
        let started = Instant::now();
        match assemble_config(params) {
            Ok(config) => self.execute(&config, limit).await,
            Err(err) => {
                warn!("Invalid registration parameters: {}", err);
                RegistrationOutcome::configuration_error(err, &self.label, started.elapsed())
            }
        }
    }
}
