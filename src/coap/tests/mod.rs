use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::registration::{RegistrationConfig, RegistrationParams, assemble_config};
use crate::registration::tests::test_params;

use super::message::{Code, Message, MessageType, OPTION_LOCATION_PATH};


const SEPARATE_ID_OFFSET: u16 = 100;

fn permission_denied(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::PermissionDenied
}

/// How the mock LwM2M server answers a register request.
#[derive(Debug, Clone, Copy)]
enum ServerScript {
    Created(&'static str),
    Reject {
        code: Code,
        diagnostic: &'static str,
    },
    Separate(&'static str),
    Silent,
}

struct MockServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Message>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// `None` when the sandbox refuses UDP sockets.
    async fn spawn(script: ServerScript) -> AppResult<Option<Self>> {
        let socket = match UdpSocket::bind("127.0.0.1:0").await {
            Ok(socket) => socket,
            Err(err) if permission_denied(&err) => return Ok(None),
            Err(err) => {
                return Err(AppError::validation(format!(
                    "Failed to bind mock server: {}",
                    err
                )));
            }
        };
        let addr = socket
            .local_addr()
            .map_err(|err| AppError::validation(format!("Missing local addr: {}", err)))?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&received);
        let task = tokio::spawn(async move {
            let mut buffer = vec![0_u8; 2048];
            while let Ok((len, peer)) = socket.recv_from(&mut buffer).await {
                let Some(datagram) = buffer.get(..len) else {
                    continue;
                };
                let Ok(request) = Message::decode(datagram) else {
                    continue;
                };
                if let Ok(mut guard) = record.lock() {
                    guard.push(request.clone());
                }
                for reply in replies(script, &request) {
                    if let Ok(bytes) = reply.encode() {
                        drop(socket.send_to(&bytes, peer).await);
                    }
                }
            }
        });
        Ok(Some(Self {
            addr,
            received,
            task,
        }))
    }

    fn received(&self) -> Vec<Message> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn requests_with_code(&self, code: Code) -> Vec<Message> {
        self.received()
            .into_iter()
            .filter(|message| message.code == code)
            .collect()
    }

    fn config(&self) -> AppResult<RegistrationConfig> {
        assemble_config(&self.params()).map_err(AppError::from)
    }

    fn params(&self) -> RegistrationParams {
        RegistrationParams {
            port: self.addr.port().to_string(),
            ..test_params()
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn replies(script: ServerScript, request: &Message) -> Vec<Message> {
    if request.message_type != MessageType::Confirmable {
        return Vec::new();
    }
    if request.code == Code::DELETE {
        return vec![piggybacked(request, Code::DELETED)];
    }
    if request.code != Code::POST {
        return Vec::new();
    }
    match script {
        ServerScript::Created(id) => {
            let mut ack = piggybacked(request, Code::CREATED);
            ack.push_option(OPTION_LOCATION_PATH, "rd");
            ack.push_option(OPTION_LOCATION_PATH, id);
            vec![ack]
        }
        ServerScript::Reject { code, diagnostic } => {
            let mut ack = piggybacked(request, code);
            ack.payload = diagnostic.as_bytes().to_vec();
            vec![ack]
        }
        ServerScript::Separate(id) => {
            let mut response = Message::new(
                MessageType::Confirmable,
                Code::CREATED,
                request.message_id.wrapping_add(SEPARATE_ID_OFFSET),
                request.token.clone(),
            );
            response.push_option(OPTION_LOCATION_PATH, "rd");
            response.push_option(OPTION_LOCATION_PATH, id);
            vec![Message::empty_ack(request.message_id), response]
        }
        ServerScript::Silent => Vec::new(),
    }
}

fn piggybacked(request: &Message, code: Code) -> Message {
    Message::new(
        MessageType::Acknowledgement,
        code,
        request.message_id,
        request.token.clone(),
    )
}
