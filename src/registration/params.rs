use std::net::Ipv6Addr;
use std::path::PathBuf;

use rand::Rng;
use url::{Host, Url};

use crate::error::ConfigError;

use super::config::{
    BindingMode, DEFAULT_LWM2M_VERSION, DEFAULT_OBJECT_LINKS, RegistrationConfig, SecurityMode,
};

pub const DEFAULT_SERVER: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "5683";
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "lwm2m-stress-";
pub const DEFAULT_LIFETIME: &str = "30";
pub const DEFAULT_SECURITY: &str = "nosec";
pub const DEFAULT_BINDING: &str = "U";

/// Raw test-plan parameters, exactly as supplied by the CLI or config file.
///
/// Nothing here is validated; [`assemble_config`] turns it into a
/// [`RegistrationConfig`] once per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationParams {
    pub server: String,
    pub port: String,
    pub client_id_prefix: String,
    pub random_suffix: bool,
    pub lifetime: String,
    pub security: String,
    pub psk_identity: Option<String>,
    pub psk_key: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
    pub server_cert: Option<String>,
    pub binding: String,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            port: DEFAULT_PORT.to_owned(),
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_owned(),
            random_suffix: true,
            lifetime: DEFAULT_LIFETIME.to_owned(),
            security: DEFAULT_SECURITY.to_owned(),
            psk_identity: None,
            psk_key: None,
            client_cert: None,
            client_key: None,
            server_cert: None,
            binding: DEFAULT_BINDING.to_owned(),
        }
    }
}

/// Builds the per-sample registration config from raw parameters.
///
/// A `coap://host:port` URI is accepted as the server; its port wins over
/// `params.port` and its scheme must agree with the security mode. A bare
/// server is a host name or IP literal without a port. With the suffix policy
/// enabled a fresh random token is appended to the client id prefix on every
/// call.
///
/// # Errors
///
/// Returns a [`ConfigError`] describing the first invalid parameter.
pub fn assemble_config(params: &RegistrationParams) -> Result<RegistrationConfig, ConfigError> {
    let target = parse_server(&params.server)?;
    let port = match target.port {
        Some(port) => port,
        None => parse_port(&params.port)?,
    };
    let lifetime_secs = parse_lifetime(&params.lifetime)?;
    let binding = parse_binding(&params.binding)?;
    let security = parse_security(params)?;
    if let Some(scheme) = target.scheme {
        let secure_scheme = scheme == SECURE_SCHEME;
        if secure_scheme == matches!(security, SecurityMode::NoSecurity) {
            return Err(ConfigError::SchemeSecurityMismatch {
                scheme,
                security: security.as_str(),
            });
        }
    }

    let prefix = params.client_id_prefix.trim();
    let endpoint = if params.random_suffix {
        format!("{}{}", prefix, random_suffix())
    } else {
        prefix.to_owned()
    };
    if endpoint.is_empty() {
        return Err(ConfigError::EmptyEndpoint);
    }

    Ok(RegistrationConfig {
        server: target.host,
        port,
        endpoint,
        lifetime_secs,
        security,
        binding,
        client_id_prefix: prefix.to_owned(),
        random_suffix: params.random_suffix,
        lwm2m_version: DEFAULT_LWM2M_VERSION.to_owned(),
        object_links: DEFAULT_OBJECT_LINKS
            .iter()
            .map(|link| (*link).to_owned())
            .collect(),
    })
}

/// 128 random bits rendered as 32 lowercase hex characters.
#[must_use]
pub fn random_suffix() -> String {
    let token: u128 = rand::thread_rng().r#gen();
    format!("{:032x}", token)
}

const PLAIN_SCHEME: &str = "coap";
const SECURE_SCHEME: &str = "coaps";

struct ServerTarget {
    host: String,
    port: Option<u16>,
    /// Set only when the server was given as a URI.
    scheme: Option<&'static str>,
}

fn parse_server(value: &str) -> Result<ServerTarget, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingServer);
    }
    if !trimmed.contains("://") {
        // A colon is only legal inside a bare IPv6 literal.
        if trimmed.contains(':') && trimmed.parse::<Ipv6Addr>().is_err() {
            return Err(ConfigError::ServerHostWithPort {
                value: trimmed.to_owned(),
            });
        }
        return Ok(ServerTarget {
            host: trimmed.to_owned(),
            port: None,
            scheme: None,
        });
    }

    let url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidServerUri {
        value: trimmed.to_owned(),
        source,
    })?;
    let scheme = match url.scheme() {
        PLAIN_SCHEME => PLAIN_SCHEME,
        SECURE_SCHEME => SECURE_SCHEME,
        other => {
            return Err(ConfigError::UnsupportedServerScheme {
                scheme: other.to_owned(),
            });
        }
    };
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_owned(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => {
            return Err(ConfigError::ServerUriMissingHost {
                value: trimmed.to_owned(),
            });
        }
    };
    Ok(ServerTarget {
        host,
        port: url.port(),
        scheme: Some(scheme),
    })
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        Ok(_) | Err(_) => Err(ConfigError::InvalidPort {
            value: value.to_owned(),
        }),
    }
}

fn parse_lifetime(value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidLifetime {
            value: value.to_owned(),
            source,
        })
}

fn parse_binding(value: &str) -> Result<BindingMode, ConfigError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "" | "U" | "UDP" => Ok(BindingMode::Udp),
        _ => Err(ConfigError::UnsupportedBinding {
            value: value.to_owned(),
        }),
    }
}

fn parse_security(params: &RegistrationParams) -> Result<SecurityMode, ConfigError> {
    match params.security.trim().to_ascii_lowercase().as_str() {
        "" | "nosec" | "none" | "no_sec" => Ok(SecurityMode::NoSecurity),
        "psk" => {
            let identity = non_empty(params.psk_identity.as_deref())
                .ok_or(ConfigError::MissingPskIdentity)?;
            let raw_key =
                non_empty(params.psk_key.as_deref()).ok_or(ConfigError::MissingPskKey)?;
            let key = decode_hex(raw_key).ok_or(ConfigError::InvalidPskKey)?;
            Ok(SecurityMode::PreSharedKey {
                identity: identity.to_owned(),
                key,
            })
        }
        "x509" | "cert" | "certificate" => Ok(SecurityMode::Certificate {
            client_cert: required_path(params.client_cert.as_deref(), "client_cert")?,
            client_key: required_path(params.client_key.as_deref(), "client_key")?,
            server_cert: required_path(params.server_cert.as_deref(), "server_cert")?,
        }),
        _ => Err(ConfigError::UnsupportedSecurity {
            value: params.security.clone(),
        }),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn required_path(value: Option<&str>, field: &'static str) -> Result<PathBuf, ConfigError> {
    non_empty(value)
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingCertificate { field })
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    value
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(digits, 16).ok()
        })
        .collect()
}
