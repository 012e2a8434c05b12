use clap::{ArgAction, Parser, Subcommand};
use std::time::Duration;

use crate::registration::{
    DEFAULT_BINDING, DEFAULT_CLIENT_ID_PREFIX, DEFAULT_LIFETIME, DEFAULT_PORT, DEFAULT_SAMPLE_LABEL,
    DEFAULT_SECURITY, DEFAULT_SERVER, RegistrationParams, Teardown,
};

use super::parsers::{
    parse_bool_env, parse_duration_arg, parse_positive_u64, parse_positive_usize,
};
use super::types::{PositiveU64, PositiveUsize};

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Register a single device and print the outcome
    Once,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Load tester for LwM2M device registration: drives many virtual CoAP clients against a server and reports latency and error rates."
)]
pub struct StressArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// LwM2M server host or coap:// URI
    #[arg(long, short = 's', default_value = DEFAULT_SERVER)]
    pub server: String,

    /// LwM2M server port (ignored when --server carries one)
    #[arg(long, short = 'p', default_value = DEFAULT_PORT)]
    pub port: String,

    /// Endpoint name prefix for every virtual device
    #[arg(long = "client-id-prefix", default_value = DEFAULT_CLIENT_ID_PREFIX)]
    pub client_id_prefix: String,

    /// Append a random 128-bit hex token to each endpoint name
    #[arg(
        long = "random-suffix",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = parse_bool_env
    )]
    pub random_suffix: bool,

    /// Requested registration lifetime (seconds)
    #[arg(long, default_value = DEFAULT_LIFETIME)]
    pub lifetime: String,

    /// Security mode (nosec, psk, x509)
    #[arg(long, default_value = DEFAULT_SECURITY)]
    pub security: String,

    /// PSK identity (security = psk)
    #[arg(long = "psk-identity")]
    pub psk_identity: Option<String>,

    /// PSK key as hex (security = psk)
    #[arg(long = "psk-key", env = "LWM2M_STRESS_PSK_KEY", hide_env_values = true)]
    pub psk_key: Option<String>,

    /// Client certificate path (security = x509)
    #[arg(long = "client-cert")]
    pub client_cert: Option<String>,

    /// Client private key path (security = x509)
    #[arg(long = "client-key")]
    pub client_key: Option<String>,

    /// Server certificate path (security = x509)
    #[arg(long = "server-cert")]
    pub server_cert: Option<String>,

    /// Binding mode (U)
    #[arg(long, default_value = DEFAULT_BINDING)]
    pub binding: String,

    /// Per-sample registration timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub timeout: Duration,

    /// Total number of registrations to run
    #[arg(long = "requests", short = 'n', default_value = "1", value_parser = parse_positive_u64)]
    pub requests: PositiveU64,

    /// Number of concurrent virtual devices
    #[arg(
        long = "concurrency",
        short = 'c',
        alias = "max-tasks",
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub concurrency: PositiveUsize,

    /// Label written into every sample record
    #[arg(long, default_value = DEFAULT_SAMPLE_LABEL)]
    pub label: String,

    /// Skip the deregistration request when a sample ends
    #[arg(long = "no-deregister")]
    pub no_deregister: bool,

    /// Write one JSON line per sample to this path
    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Exit non-zero when any sample fails
    #[arg(long = "fail-on-error")]
    pub fail_on_error: bool,

    /// Path to config file (TOML/JSON). Defaults to ./lwm2m-stress.toml or ./lwm2m-stress.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Enable verbose logging (sets log level to debug unless overridden by LWM2M_STRESS_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}

impl StressArgs {
    /// Registration parameters as typed on the command line; validated per sample.
    #[must_use]
    pub fn to_params(&self) -> RegistrationParams {
        RegistrationParams {
            server: self.server.clone(),
            port: self.port.clone(),
            client_id_prefix: self.client_id_prefix.clone(),
            random_suffix: self.random_suffix,
            lifetime: self.lifetime.clone(),
            security: self.security.clone(),
            psk_identity: self.psk_identity.clone(),
            psk_key: self.psk_key.clone(),
            client_cert: self.client_cert.clone(),
            client_key: self.client_key.clone(),
            server_cert: self.server_cert.clone(),
            binding: self.binding.clone(),
        }
    }

    #[must_use]
    pub const fn teardown(&self) -> Teardown {
        if self.no_deregister {
            Teardown::Release
        } else {
            Teardown::Deregister
        }
    }
}
