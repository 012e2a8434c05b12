use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered and refused the registration.
    Rejected,
    /// No usable answer: resolve/bind/send failure, reset, or retransmissions exhausted.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Response code reported by the server (e.g. `4.03`), when there was one.
    pub code: Option<String>,
}

impl RegistrationFailure {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Rejected,
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
            code: None,
        }
    }
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Events a protocol client reports to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Started,
    Success { registration_id: String },
    Failure(RegistrationFailure),
    UpdateSuccess,
}

/// Receives protocol events.
///
/// Called from the client's own task, so implementations must not block.
pub trait RegistrationObserver: Send + Sync {
    fn on_event(&self, event: &ObserverEvent);
}
