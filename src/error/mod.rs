mod app;
mod client;
mod config;
mod metrics;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use client::ClientError;
pub use config::ConfigError;
pub use metrics::MetricsError;
pub use validation::ValidationError;
