use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult, ClientError};

use super::{
    ClientFactory, ObserverEvent, ProtocolClient, RegistrationConfig, RegistrationFailure,
    RegistrationObserver, RegistrationParams, assemble_config,
};

mod executor;

pub(crate) fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

pub(crate) fn test_params() -> RegistrationParams {
    RegistrationParams {
        server: "127.0.0.1".to_owned(),
        port: "5683".to_owned(),
        client_id_prefix: "device-".to_owned(),
        random_suffix: false,
        lifetime: "30".to_owned(),
        ..RegistrationParams::default()
    }
}

pub(crate) fn test_config() -> AppResult<RegistrationConfig> {
    assemble_config(&test_params()).map_err(AppError::from)
}

/// How a scripted client behaves once started.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    Succeed(&'static str),
    Reject(&'static str),
    Silent,
    SuccessThenFailure(&'static str),
    FailBuild,
    FailStart,
    Delayed {
        after: Duration,
        registration_id: &'static str,
    },
    /// `start()` itself blocks for `delay`, then registration succeeds.
    SlowStart {
        delay: Duration,
        registration_id: &'static str,
    },
    /// Succeeds at once; a graceful `stop()` blocks for `delay`.
    SlowStop {
        delay: Duration,
        registration_id: &'static str,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) builds: AtomicUsize,
    pub(crate) starts: AtomicUsize,
    pub(crate) stops: AtomicUsize,
    pub(crate) graceful_stops: AtomicUsize,
    pub(crate) completed_graceful_stops: AtomicUsize,
}

impl Counters {
    pub(crate) fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedFactory {
    script: Script,
    pub(crate) counters: Arc<Counters>,
    pub(crate) endpoints: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            counters: Arc::new(Counters::default()),
            endpoints: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn endpoints(&self) -> Vec<String> {
        match self.endpoints.lock() {
            Ok(endpoints) => endpoints.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ClientFactory for ScriptedFactory {
    fn build(&self, config: &RegistrationConfig) -> Result<Box<dyn ProtocolClient>, ClientError> {
        self.counters.builds.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.push(config.endpoint.clone());
        }
        if matches!(self.script, Script::FailBuild) {
            return Err(ClientError::UnsupportedSecurity { mode: "psk" });
        }
        Ok(Box::new(ScriptedClient {
            script: self.script,
            counters: Arc::clone(&self.counters),
            observers: Vec::new(),
            task: None,
        }))
    }
}

struct ScriptedClient {
    script: Script,
    counters: Arc<Counters>,
    observers: Vec<Arc<dyn RegistrationObserver>>,
    task: Option<JoinHandle<()>>,
}

fn notify(observers: &[Arc<dyn RegistrationObserver>], event: &ObserverEvent) {
    for observer in observers {
        observer.on_event(event);
    }
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    fn add_observer(&mut self, observer: Arc<dyn RegistrationObserver>) {
        self.observers.push(observer);
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if matches!(self.script, Script::FailStart) {
            return Err(ClientError::Bind {
                source: std::io::Error::other("address in use"),
            });
        }
        if let Script::SlowStart { delay, .. } = self.script {
            tokio::time::sleep(delay).await;
        }
        let observers = self.observers.clone();
        let script = self.script;
        self.task = Some(tokio::spawn(async move {
            notify(&observers, &ObserverEvent::Started);
            match script {
                Script::Succeed(id) => notify(
                    &observers,
                    &ObserverEvent::Success {
                        registration_id: id.to_owned(),
                    },
                ),
                Script::Reject(reason) => notify(
                    &observers,
                    &ObserverEvent::Failure(RegistrationFailure::rejected("4.03", reason)),
                ),
                Script::SuccessThenFailure(id) => {
                    notify(
                        &observers,
                        &ObserverEvent::Success {
                            registration_id: id.to_owned(),
                        },
                    );
                    notify(
                        &observers,
                        &ObserverEvent::Failure(RegistrationFailure::rejected(
                            "5.00", "rejected",
                        )),
                    );
                }
                Script::Delayed {
                    after,
                    registration_id,
                } => {
                    tokio::time::sleep(after).await;
                    notify(
                        &observers,
                        &ObserverEvent::Success {
                            registration_id: registration_id.to_owned(),
                        },
                    );
                }
                Script::SlowStart {
                    registration_id, ..
                }
                | Script::SlowStop {
                    registration_id, ..
                } => notify(
                    &observers,
                    &ObserverEvent::Success {
                        registration_id: registration_id.to_owned(),
                    },
                ),
                Script::Silent | Script::FailBuild | Script::FailStart => {}
            }
            notify(&observers, &ObserverEvent::UpdateSuccess);
        }));
        Ok(())
    }

    async fn stop(&mut self, force: bool) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if !force {
            self.counters.graceful_stops.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Script::SlowStop { delay, .. } = self.script {
            if !force {
                tokio::time::sleep(delay).await;
                self.counters.completed_graceful_stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for ScriptedClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
