use std::time::Duration;

use serde::Deserialize;

use crate::args::parsers::parse_duration_arg;
use crate::error::{AppError, AppResult, ValidationError};

/// On-disk configuration; every field is optional and CLI flags win.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub client_id_prefix: Option<String>,
    pub random_suffix: Option<bool>,
    pub lifetime: Option<u64>,
    pub security: Option<String>,
    pub psk_identity: Option<String>,
    pub psk_key: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
    pub server_cert: Option<String>,
    pub binding: Option<String>,
    pub timeout: Option<DurationValue>,
    pub requests: Option<u64>,
    #[serde(alias = "max_tasks")]
    pub concurrency: Option<usize>,
    pub label: Option<String>,
    pub no_deregister: Option<bool>,
    pub output: Option<String>,
    pub fail_on_error: Option<bool>,
    pub coap: Option<CoapConfig>,
}

/// `[coap]` transmission tuning.
#[derive(Debug, Default, Deserialize)]
pub struct CoapConfig {
    pub ack_timeout: Option<DurationValue>,
    pub max_retransmit: Option<u32>,
    pub separate_response_timeout: Option<DurationValue>,
    pub deregister_timeout: Option<DurationValue>,
}

/// Either whole seconds or a `<n><unit>` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> AppResult<Duration> {
        match self {
            Self::Seconds(0) => Err(AppError::validation(ValidationError::DurationZero)),
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration_arg(text),
        }
    }
}
