use std::time::Duration;

use serde::Serialize;

use super::bridge::{Completion, TerminalEvent};
use super::event::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Rejected,
    TransportError,
    Timeout,
    ConfigurationError,
}

impl OutcomeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::TransportError => "transport_error",
            Self::Timeout => "timeout",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

/// Binary verdict surfaced to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

impl SampleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Failed => "FAILED",
        }
    }
}

pub(crate) struct SampleContext<'ctx> {
    pub(crate) label: &'ctx str,
    pub(crate) endpoint: &'ctx str,
    pub(crate) server_uri: &'ctx str,
    pub(crate) limit: Duration,
}

/// Result of exactly one sample. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    kind: OutcomeKind,
    message: String,
    registration_id: Option<String>,
    response_code: String,
    elapsed: Duration,
    payload: Vec<u8>,
    endpoint: Option<String>,
    label: String,
}

impl RegistrationOutcome {
    pub(crate) fn from_completion(
        completion: Completion,
        context: &SampleContext<'_>,
        elapsed: Duration,
    ) -> Self {
        let (kind, message, registration_id, response_code) = match completion {
            Completion::Terminal(TerminalEvent::Registered { registration_id }) => (
                OutcomeKind::Success,
                format!("register success, registration id {}", registration_id),
                Some(registration_id),
                "200".to_owned(),
            ),
            Completion::Terminal(TerminalEvent::Failed(failure)) => match failure.kind {
                FailureKind::Rejected => (
                    OutcomeKind::Rejected,
                    format!("registration rejected by {}: {}", context.server_uri, failure),
                    None,
                    failure.code.unwrap_or_else(|| "400".to_owned()),
                ),
                FailureKind::Transport => (
                    OutcomeKind::TransportError,
                    format!("transport error: {}", failure),
                    None,
                    "500".to_owned(),
                ),
            },
            Completion::Abandoned => (
                OutcomeKind::TransportError,
                "transport error: client stopped without reporting a result".to_owned(),
                None,
                "500".to_owned(),
            ),
            Completion::TimedOut => (
                OutcomeKind::Timeout,
                format!(
                    "no registration result within {} ms",
                    context.limit.as_millis()
                ),
                None,
                "504".to_owned(),
            ),
        };

        Self {
            kind,
            message,
            registration_id,
            response_code,
            elapsed,
            payload: context.server_uri.as_bytes().to_vec(),
            endpoint: Some(context.endpoint.to_owned()),
            label: context.label.to_owned(),
        }
    }

    pub(crate) fn configuration_error(
        message: impl std::fmt::Display,
        label: &str,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind: OutcomeKind::ConfigurationError,
            message: format!("configuration error: {}", message),
            registration_id: None,
            response_code: "400".to_owned(),
            elapsed,
            payload: Vec::new(),
            endpoint: None,
            label: label.to_owned(),
        }
    }

    #[cfg(test)]
    pub(crate) fn synthetic(kind: OutcomeKind, elapsed: Duration) -> Self {
        let success = matches!(kind, OutcomeKind::Success);
        Self {
            kind,
            message: format!("synthetic {}", kind.as_str()),
            registration_id: success.then(|| "synthetic".to_owned()),
            response_code: if success { "200" } else { "500" }.to_owned(),
            elapsed,
            payload: b"coap://127.0.0.1:5683".to_vec(),
            endpoint: Some("device-synthetic".to_owned()),
            label: "lwm2m-register".to_owned(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        self.kind
    }

    #[must_use]
    pub const fn status(&self) -> SampleStatus {
        match self.kind {
            OutcomeKind::Success => SampleStatus::Ok,
            OutcomeKind::Rejected
            | OutcomeKind::TransportError
            | OutcomeKind::Timeout
            | OutcomeKind::ConfigurationError => SampleStatus::Failed,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.kind, OutcomeKind::Success)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn registration_id(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }

    #[must_use]
    pub fn response_code(&self) -> &str {
        &self.response_code
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}
