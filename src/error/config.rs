use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("Server address must not be empty.")]
    MissingServer,
    #[error("Invalid server URI '{value}': {source}")]
    InvalidServerUri {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported server URI scheme '{scheme}'. Use coap or coaps.")]
    UnsupportedServerScheme { scheme: String },
    #[error("Server URI '{value}' is missing a host.")]
    ServerUriMissingHost { value: String },
    #[error("Server '{value}' carries a port. Use --port or a coap://host:port URI.")]
    ServerHostWithPort { value: String },
    #[error("Server URI scheme '{scheme}' does not match security mode '{security}'.")]
    SchemeSecurityMismatch {
        scheme: &'static str,
        security: &'static str,
    },
    #[error("Invalid port '{value}'. Expected an integer in 1..=65535.")]
    InvalidPort { value: String },
    #[error("Invalid lifetime '{value}': {source}")]
    InvalidLifetime {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Endpoint name must not be empty (set a client id prefix or enable the random suffix).")]
    EmptyEndpoint,
    #[error("Unsupported binding mode '{value}'. Only U (UDP) is supported.")]
    UnsupportedBinding { value: String },
    #[error("Unsupported security mode '{value}'. Use nosec, psk, or x509.")]
    UnsupportedSecurity { value: String },
    #[error("PSK security requires a PSK identity.")]
    MissingPskIdentity,
    #[error("PSK security requires a PSK key.")]
    MissingPskKey,
    #[error("Invalid PSK key: expected an even-length hex string.")]
    InvalidPskKey,
    #[error("X.509 security requires '{field}'.")]
    MissingCertificate { field: &'static str },
    #[error("Config field '{field}' must be > 0: {source}")]
    FieldMustBePositive {
        field: &'static str,
        #[source]
        source: super::ValidationError,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
