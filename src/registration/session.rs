use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, trace};

use super::bridge::{Completion, CompletionReceiver, CompletionSender, TerminalEvent, completion_bridge};
use super::client::{ClientFactory, ProtocolClient};
use super::config::RegistrationConfig;
use super::event::{ObserverEvent, RegistrationFailure, RegistrationObserver};

/// Upper bound for a forced stop, which only releases the client.
pub const RELEASE_GRACE: Duration = Duration::from_millis(100);

/// Roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(946_080_000);

/// Deadline `limit` from now, saturating far in the future on overflow.
#[must_use]
pub fn sample_deadline(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Started,
    Succeeded,
    Failed,
    TimedOut,
    Closed,
}

/// What `stop` does with a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Send a deregistration before releasing the transport.
    Deregister,
    /// Release the transport and let the registration expire server-side.
    Release,
}

struct BridgeObserver {
    endpoint: String,
    sender: CompletionSender,
    started: AtomicBool,
}

impl RegistrationObserver for BridgeObserver {
    fn on_event(&self, event: &ObserverEvent) {
        let terminal = match event {
            ObserverEvent::Started => {
                self.started.store(true, Ordering::Release);
                debug!(endpoint = %self.endpoint, "Registration started");
                return;
            }
            ObserverEvent::UpdateSuccess => {
                trace!(endpoint = %self.endpoint, "Ignoring registration update");
                return;
            }
            ObserverEvent::Success { registration_id } => TerminalEvent::Registered {
                registration_id: registration_id.clone(),
            },
            ObserverEvent::Failure(failure) => TerminalEvent::Failed(failure.clone()),
        };
        if !self.started.load(Ordering::Acquire) {
            debug!(endpoint = %self.endpoint, "Terminal event arrived before start notification");
        }
        if !self.sender.complete(terminal) {
            debug!(endpoint = %self.endpoint, "Dropping terminal event after completion");
        }
    }
}

/// One registration attempt against one private protocol client.
pub struct RegistrationSession {
    endpoint: String,
    state: SessionState,
    teardown: Teardown,
    client: Option<Box<dyn ProtocolClient>>,
    receiver: Option<CompletionReceiver>,
    started_at: Instant,
    deadline: Instant,
    start_overran: bool,
}

impl RegistrationSession {
    /// Builds and starts a client for `config`. Every later wait of this
    /// session, including teardown, is bounded by `deadline`.
    ///
    /// Never fails: a client that cannot be built or started is reported as a
    /// transport failure through the session's own completion slot, and a
    /// start still running at `deadline` turns the session into a timeout.
    pub async fn start(
        factory: &dyn ClientFactory,
        config: &RegistrationConfig,
        teardown: Teardown,
        deadline: Instant,
    ) -> Self {
        let (sender, receiver) = completion_bridge();
        let observer = Arc::new(BridgeObserver {
            endpoint: config.endpoint.clone(),
            sender,
            started: AtomicBool::new(false),
        });
        let mut session = Self {
            endpoint: config.endpoint.clone(),
            state: SessionState::Idle,
            teardown,
            client: None,
            receiver: Some(receiver),
            started_at: Instant::now(),
            deadline,
            start_overran: false,
        };
        session.state = SessionState::Started;

        let mut client = match factory.build(config) {
            Ok(client) => client,
            Err(err) => {
                observer.on_event(&ObserverEvent::Failure(RegistrationFailure::transport(
                    format!("Failed to build protocol client: {}", err),
                )));
                return session;
            }
        };
        client.add_observer(observer.clone());
        let started = timeout_at(deadline, client.start()).await;
        session.client = Some(client);
        match started {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                observer.on_event(&ObserverEvent::Failure(RegistrationFailure::transport(
                    format!("Failed to start protocol client: {}", err),
                )));
            }
            Err(_elapsed) => {
                debug!(endpoint = %session.endpoint, "Client start overran the sample deadline");
                session.start_overran = true;
            }
        }
        session
    }

    /// Waits for the first terminal event, at most until the session deadline.
    ///
    /// Only the first call waits; later calls report `Abandoned` without
    /// touching the state. Events are not read once the deadline has passed.
    pub async fn await_terminal(&mut self) -> Completion {
        let Some(receiver) = self.receiver.take() else {
            return Completion::Abandoned;
        };
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let completion = if self.start_overran || remaining.is_zero() {
            Completion::TimedOut
        } else {
            receiver.wait(remaining).await
        };
        if self.state == SessionState::Started {
            self.state = match &completion {
                Completion::Terminal(TerminalEvent::Registered { .. }) => SessionState::Succeeded,
                Completion::Terminal(TerminalEvent::Failed(_)) | Completion::Abandoned => {
                    SessionState::Failed
                }
                Completion::TimedOut => SessionState::TimedOut,
            };
        }
        completion
    }

    /// Stops the client. Safe in every state and idempotent.
    ///
    /// A graceful stop gets whatever is left of the sample budget; once that
    /// is spent the client is only released, within [`RELEASE_GRACE`]. A
    /// client that overruns its bound is dropped, which aborts its tasks.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut client) = self.client.take() {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let force = self.teardown != Teardown::Deregister
                || self.state != SessionState::Succeeded
                || remaining.is_zero();
            let bound = if force { RELEASE_GRACE } else { remaining };
            if timeout(bound, client.stop(force)).await.is_err() {
                debug!(endpoint = %self.endpoint, force, "Client stop overran; dropping client");
            }
        }
        self.receiver = None;
        debug!(endpoint = %self.endpoint, from = ?self.state, "Session closed");
        self.state = SessionState::Closed;
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Drop for RegistrationSession {
    fn drop(&mut self) {
        // Dropping the boxed client aborts its tasks.
        if self.client.is_some() {
            debug!(endpoint = %self.endpoint, "Session dropped without stop");
        }
    }
}
