use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::debug;

use crate::error::ClientError;
use crate::registration::{
    ClientFactory, ObserverEvent, ProtocolClient, RegistrationConfig, RegistrationFailure,
    RegistrationObserver, SecurityMode,
};

use super::lwm2m::{deregister_request, register_request, registration_id, registration_location};
use super::message::{Code, Message, MessageType};

const RECV_BUFFER_BYTES: usize = 2048;
const TOKEN_BYTES: usize = 8;

/// Confirmable-message timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionParams {
    /// Wait before the first retransmission; doubled after each one.
    pub ack_timeout: Duration,
    pub max_retransmit: u32,
    /// How long to wait for a separate response after an empty ACK.
    pub separate_response_timeout: Duration,
    /// Upper bound on the graceful deregistration exchange.
    pub deregister_timeout: Duration,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(2),
            max_retransmit: 4,
            separate_response_timeout: Duration::from_secs(30),
            deregister_timeout: Duration::from_secs(1),
        }
    }
}

/// Builds plain-UDP registration clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpClientFactory {
    params: TransmissionParams,
}

impl UdpClientFactory {
    #[must_use]
    pub const fn new(params: TransmissionParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> TransmissionParams {
        self.params
    }
}

impl ClientFactory for UdpClientFactory {
    fn build(&self, config: &RegistrationConfig) -> Result<Box<dyn ProtocolClient>, ClientError> {
        match &config.security {
            SecurityMode::NoSecurity => Ok(Box::new(UdpRegistrationClient::new(
                config.clone(),
                self.params,
            ))),
            mode @ (SecurityMode::PreSharedKey { .. } | SecurityMode::Certificate { .. }) => {
                Err(ClientError::UnsupportedSecurity {
                    mode: mode.as_str(),
                })
            }
        }
    }
}

/// One LwM2M device registering over a connected UDP socket.
pub struct UdpRegistrationClient {
    config: RegistrationConfig,
    params: TransmissionParams,
    observers: Vec<Arc<dyn RegistrationObserver>>,
    socket: Option<Arc<UdpSocket>>,
    task: Option<JoinHandle<Option<Vec<String>>>>,
    next_message_id: u16,
    stopped: bool,
}

impl UdpRegistrationClient {
    #[must_use]
    pub fn new(config: RegistrationConfig, params: TransmissionParams) -> Self {
        Self {
            config,
            params,
            observers: Vec::new(),
            socket: None,
            task: None,
            next_message_id: rand::thread_rng().r#gen(),
            stopped: false,
        }
    }

    fn take_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = id.wrapping_add(1);
        id
    }

    async fn open_socket(&self) -> Result<UdpSocket, ClientError> {
        let host = self.config.server.as_str();
        let port = self.config.port;
        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| ClientError::ResolveHost {
                host: host.to_owned(),
                port,
                source,
            })?
            .next()
            .ok_or_else(|| ClientError::NoAddressesResolved {
                host: host.to_owned(),
            })?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| ClientError::Bind { source })?;
        socket
            .connect(peer)
            .await
            .map_err(|source| ClientError::Connect { peer, source })?;
        Ok(socket)
    }

    async fn deregister(&mut self, location: &[String]) {
        let Some(socket) = self.socket.clone() else {
            return;
        };
        let request = deregister_request(location, self.take_message_id(), new_token());
        let params = self.params;
        match timeout(
            params.deregister_timeout,
            exchange(&socket, &request, &params),
        )
        .await
        {
            Ok(Ok(response)) if response.code == Code::DELETED => {
                debug!(endpoint = %self.config.endpoint, "Deregistered.");
            }
            Ok(Ok(response)) => {
                debug!(
                    endpoint = %self.config.endpoint,
                    code = %response.code,
                    "Deregistration answered with a non-success code."
                );
            }
            Ok(Err(err)) => {
                debug!(endpoint = %self.config.endpoint, "Deregistration failed: {}", err);
            }
            Err(_elapsed) => {
                debug!(
                    endpoint = %self.config.endpoint,
                    "Deregistration got no answer within {} ms.",
                    params.deregister_timeout.as_millis()
                );
            }
        }
    }
}

#[async_trait]
impl ProtocolClient for UdpRegistrationClient {
    fn add_observer(&mut self, observer: Arc<dyn RegistrationObserver>) {
        self.observers.push(observer);
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        if self.stopped {
            return Err(ClientError::Stopped);
        }
        if self.socket.is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        let socket = Arc::new(self.open_socket().await?);
        let message_id = self.take_message_id();
        let request = register_request(&self.config, message_id, new_token());
        let observers = self.observers.clone();
        let params = self.params;
        let task_socket = Arc::clone(&socket);
        self.socket = Some(socket);
        self.task = Some(tokio::spawn(async move {
            notify(&observers, &ObserverEvent::Started);
            let result = exchange(&task_socket, &request, &params).await;
            let (event, location) = interpret_register_response(result);
            notify(&observers, &event);
            location
        }));
        Ok(())
    }

    async fn stop(&mut self, force: bool) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let location = match self.task.take() {
            Some(task) => {
                task.abort();
                task.await.ok().flatten()
            }
            None => None,
        };
        if let Some(location) = location.filter(|_| !force) {
            self.deregister(&location).await;
        }
        self.socket = None;
    }
}

impl Drop for UdpRegistrationClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn notify(observers: &[Arc<dyn RegistrationObserver>], event: &ObserverEvent) {
    for observer in observers {
        observer.on_event(event);
    }
}

fn new_token() -> Vec<u8> {
    let token: [u8; TOKEN_BYTES] = rand::thread_rng().r#gen();
    token.to_vec()
}

fn interpret_register_response(
    result: Result<Message, ClientError>,
) -> (ObserverEvent, Option<Vec<String>>) {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            return (
                ObserverEvent::Failure(RegistrationFailure::transport(err.to_string())),
                None,
            );
        }
    };
    let code = response.code;
    if code == Code::CREATED {
        let location = registration_location(&response);
        let id = location
            .as_deref()
            .and_then(registration_id)
            .map(str::to_owned);
        return match (id, location) {
            (Some(registration_id), Some(location)) => {
                (ObserverEvent::Success { registration_id }, Some(location))
            }
            (None, _) | (_, None) => (
                ObserverEvent::Failure(RegistrationFailure::rejected(
                    code.to_string(),
                    "registration created without a location",
                )),
                None,
            ),
        };
    }
    let diagnostic = if code.is_success() {
        format!("unexpected {} answer to a register request", code.reason())
    } else if response.payload.is_empty() {
        code.reason().to_owned()
    } else {
        String::from_utf8_lossy(&response.payload).into_owned()
    };
    (
        ObserverEvent::Failure(RegistrationFailure::rejected(code.to_string(), diagnostic)),
        None,
    )
}

/// Sends a confirmable request and returns the matching response.
///
/// Handles piggybacked and separate responses; retransmits with exponential
/// back-off until `max_retransmit` is exhausted.
async fn exchange(
    socket: &UdpSocket,
    request: &Message,
    params: &TransmissionParams,
) -> Result<Message, ClientError> {
    let bytes = request.encode()?;
    let mut buffer = vec![0_u8; RECV_BUFFER_BYTES];
    let mut wait = params.ack_timeout;
    let mut attempts: u32 = 0;

    loop {
        socket
            .send(&bytes)
            .await
            .map_err(|source| ClientError::Send { source })?;
        attempts = attempts.saturating_add(1);

        let deadline = deadline_after(wait);
        match await_ack(socket, request, &mut buffer, deadline).await? {
            AckWait::Response(response) => return Ok(response),
            AckWait::Acknowledged => {
                return await_separate(socket, request, &mut buffer, params).await;
            }
            AckWait::TimedOut => {}
        }

        if attempts > params.max_retransmit {
            return Err(ClientError::NoResponse { attempts });
        }
        debug!(
            message_id = request.message_id,
            attempt = attempts,
            "Retransmitting confirmable request."
        );
        wait = wait.saturating_mul(2);
    }
}

enum AckWait {
    Response(Message),
    Acknowledged,
    TimedOut,
}

async fn await_ack(
    socket: &UdpSocket,
    request: &Message,
    buffer: &mut [u8],
    deadline: Instant,
) -> Result<AckWait, ClientError> {
    loop {
        let Some(message) = receive_until(socket, buffer, deadline).await? else {
            return Ok(AckWait::TimedOut);
        };
        let same_exchange = message.message_id == request.message_id;
        match message.message_type {
            MessageType::Reset if same_exchange => return Err(ClientError::Reset),
            MessageType::Acknowledgement if same_exchange && message.code.is_empty() => {
                return Ok(AckWait::Acknowledged);
            }
            MessageType::Acknowledgement if same_exchange && message.token == request.token => {
                return Ok(AckWait::Response(message));
            }
            MessageType::Confirmable | MessageType::NonConfirmable
                if message.token == request.token && !message.code.is_empty() =>
            {
                // Separate response overtook a lost empty ACK.
                acknowledge(socket, &message).await?;
                return Ok(AckWait::Response(message));
            }
            MessageType::Confirmable
            | MessageType::NonConfirmable
            | MessageType::Acknowledgement
            | MessageType::Reset => {
                debug!(message_id = message.message_id, "Ignoring unrelated datagram.");
            }
        }
    }
}

async fn await_separate(
    socket: &UdpSocket,
    request: &Message,
    buffer: &mut [u8],
    params: &TransmissionParams,
) -> Result<Message, ClientError> {
    let deadline = deadline_after(params.separate_response_timeout);
    loop {
        let Some(message) = receive_until(socket, buffer, deadline).await? else {
            return Err(ClientError::SeparateResponseTimeout {
                waited_ms: u64::try_from(params.separate_response_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            });
        };
        let is_response = matches!(
            message.message_type,
            MessageType::Confirmable | MessageType::NonConfirmable
        ) && message.token == request.token
            && !message.code.is_empty();
        if is_response {
            acknowledge(socket, &message).await?;
            return Ok(message);
        }
        debug!(message_id = message.message_id, "Ignoring unrelated datagram.");
    }
}

async fn acknowledge(socket: &UdpSocket, message: &Message) -> Result<(), ClientError> {
    if message.message_type != MessageType::Confirmable {
        return Ok(());
    }
    let ack = Message::empty_ack(message.message_id).encode()?;
    socket
        .send(&ack)
        .await
        .map_err(|source| ClientError::Send { source })?;
    Ok(())
}

/// Next decodable datagram, or `None` once `deadline` passes.
async fn receive_until(
    socket: &UdpSocket,
    buffer: &mut [u8],
    deadline: Instant,
) -> Result<Option<Message>, ClientError> {
    loop {
        let read = match tokio::time::timeout_at(deadline, socket.recv(buffer)).await {
            Ok(Ok(read)) => read,
            Ok(Err(source)) => return Err(ClientError::Receive { source }),
            Err(_elapsed) => return Ok(None),
        };
        let datagram = buffer.get(..read).unwrap_or_default();
        match Message::decode(datagram) {
            Ok(message) => return Ok(Some(message)),
            Err(err) => debug!("Dropping undecodable datagram: {}", err),
        }
    }
}

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or(now)
}
