use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;

use super::config::RegistrationConfig;
use super::event::RegistrationObserver;

/// A registration-capable protocol client, one instance per sample.
#[async_trait]
pub trait ProtocolClient: Send {
    fn add_observer(&mut self, observer: Arc<dyn RegistrationObserver>);

    /// Opens the transport and kicks off the registration handshake.
    ///
    /// Returns once the handshake is in flight; its result arrives through the
    /// observers.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport cannot be opened.
    async fn start(&mut self) -> Result<(), ClientError>;

    /// Releases the transport. `force = false` deregisters first when a
    /// registration is active. Must be callable in any state, repeatedly.
    async fn stop(&mut self, force: bool);
}

pub trait ClientFactory: Send + Sync {
    /// Builds an unstarted client for one sample.
    ///
    /// # Errors
    ///
    /// Returns an error when the config cannot be served by this client.
    fn build(&self, config: &RegistrationConfig) -> Result<Box<dyn ProtocolClient>, ClientError>;
}
