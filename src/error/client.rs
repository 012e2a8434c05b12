use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to resolve {host}:{port} ({source})")]
    ResolveHost {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("No addresses resolved for {host}.")]
    NoAddressesResolved { host: String },
    #[error("Failed to bind UDP socket: {source}")]
    Bind {
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to connect UDP socket to {peer}: {source}")]
    Connect {
        peer: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send datagram: {source}")]
    Send {
        #[source]
        source: std::io::Error,
    },
    #[error("Security mode '{mode}' is not supported by the UDP client.")]
    UnsupportedSecurity { mode: &'static str },
    #[error("Protocol client was already started.")]
    AlreadyStarted,
    #[error("Protocol client was stopped.")]
    Stopped,
    #[error("Failed to receive datagram: {source}")]
    Receive {
        #[source]
        source: std::io::Error,
    },
    #[error("Exchange was reset by the server.")]
    Reset,
    #[error("No response after {attempts} transmissions.")]
    NoResponse { attempts: u32 },
    #[error("Separate response did not arrive within {waited_ms} ms of the acknowledgement.")]
    SeparateResponseTimeout { waited_ms: u64 },
    #[error("CoAP message is malformed: {reason}")]
    Malformed { reason: &'static str },
    #[error("CoAP packet could not be encoded or decoded: {reason}")]
    Codec { reason: String },
}
