use std::fmt;
use std::path::PathBuf;

/// LwM2M enabler version advertised in the register request.
pub const DEFAULT_LWM2M_VERSION: &str = "1.0";
/// Object instances advertised by every virtual device (Server and Device).
pub const DEFAULT_OBJECT_LINKS: &[&str] = &["/1/0", "/3/0"];

#[derive(Clone, PartialEq, Eq)]
pub enum SecurityMode {
    NoSecurity,
    PreSharedKey {
        identity: String,
        key: Vec<u8>,
    },
    Certificate {
        client_cert: PathBuf,
        client_key: PathBuf,
        server_cert: PathBuf,
    },
}

impl SecurityMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoSecurity => "nosec",
            Self::PreSharedKey { .. } => "psk",
            Self::Certificate { .. } => "x509",
        }
    }
}

// Key material stays out of logs.
impl fmt::Debug for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSecurity => f.write_str("NoSecurity"),
            Self::PreSharedKey { identity, .. } => f
                .debug_struct("PreSharedKey")
                .field("identity", identity)
                .finish_non_exhaustive(),
            Self::Certificate {
                client_cert,
                client_key,
                server_cert,
            } => f
                .debug_struct("Certificate")
                .field("client_cert", client_cert)
                .field("client_key", client_key)
                .field("server_cert", server_cert)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Udp,
}

impl BindingMode {
    /// Binding letter sent in the `b=` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "U",
        }
    }
}

/// Immutable per-sample registration settings.
///
/// Built by [`super::assemble_config`]; the endpoint name is guaranteed to be
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    pub server: String,
    pub port: u16,
    pub endpoint: String,
    pub lifetime_secs: u64,
    pub security: SecurityMode,
    pub binding: BindingMode,
    pub client_id_prefix: String,
    pub random_suffix: bool,
    pub lwm2m_version: String,
    pub object_links: Vec<String>,
}

impl RegistrationConfig {
    #[must_use]
    pub fn server_uri(&self) -> String {
        let scheme = match self.security {
            SecurityMode::NoSecurity => "coap",
            SecurityMode::PreSharedKey { .. } | SecurityMode::Certificate { .. } => "coaps",
        };
        if self.server.contains(':') {
            format!("{}://[{}]:{}", scheme, self.server, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.server, self.port)
        }
    }

    /// CoRE link-format payload announcing the device's objects.
    #[must_use]
    pub fn link_format(&self) -> String {
        let mut links = Vec::with_capacity(self.object_links.len().saturating_add(1));
        links.push("</>;rt=\"oma.lwm2m\"".to_owned());
        links.extend(self.object_links.iter().map(|path| format!("<{}>", path)));
        links.join(",")
    }
}
