//! Registration lifecycle: config assembly, the per-sample session, the
//! completion bridge and the sample executor.
mod blocking;
mod bridge;
mod client;
mod config;
mod event;
mod executor;
mod outcome;
mod params;
mod session;

#[cfg(test)]
pub(crate) mod tests;

pub use blocking::BlockingSampler;
pub use bridge::{Completion, CompletionReceiver, CompletionSender, TerminalEvent, completion_bridge};
pub use client::{ClientFactory, ProtocolClient};
pub use config::{
    BindingMode, DEFAULT_LWM2M_VERSION, DEFAULT_OBJECT_LINKS, RegistrationConfig, SecurityMode,
};
pub use event::{FailureKind, ObserverEvent, RegistrationFailure, RegistrationObserver};
pub use executor::{DEFAULT_SAMPLE_LABEL, SampleExecutor};
pub use outcome::{OutcomeKind, RegistrationOutcome, SampleStatus};
pub use params::{
    DEFAULT_BINDING, DEFAULT_CLIENT_ID_PREFIX, DEFAULT_LIFETIME, DEFAULT_PORT, DEFAULT_SECURITY,
    DEFAULT_SERVER, RegistrationParams, assemble_config, random_suffix,
};
pub use session::{
    RELEASE_GRACE, RegistrationSession, SessionState, Teardown, sample_deadline,
};
