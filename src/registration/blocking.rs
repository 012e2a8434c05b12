use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::error::{AppError, AppResult, ValidationError};

use super::config::RegistrationConfig;
use super::executor::SampleExecutor;
use super::outcome::RegistrationOutcome;
use super::params::RegistrationParams;

const SAMPLER_WORKER_THREADS: usize = 2;

/// Blocking front for callers that measure one operation per call.
///
/// Owns a small runtime that drives the protocol client while the caller's
/// thread is parked. Must not be used from inside another tokio runtime.
pub struct BlockingSampler {
    runtime: Runtime,
    executor: SampleExecutor,
}

impl BlockingSampler {
    /// # Errors
    ///
    /// Returns an error when the runtime cannot be built.
    pub fn new(executor: SampleExecutor) -> AppResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(SAMPLER_WORKER_THREADS)
            .thread_name("lwm2m-sampler")
            .enable_all()
            .build()
            .map_err(|source| AppError::validation(ValidationError::RuntimeBuildFailed { source }))?;
        Ok(Self { runtime, executor })
    }

    pub fn run_one_sample(&self, config: &RegistrationConfig, limit: Duration) -> RegistrationOutcome {
        self.runtime.block_on(self.executor.execute(config, limit))
    }

    pub fn run_params(&self, params: &RegistrationParams, limit: Duration) -> RegistrationOutcome {
        self.runtime.block_on(self.executor.run_params(params, limit))
    }
}
