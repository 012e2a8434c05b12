use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, StressArgs};
use crate::coap::TransmissionParams;
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

/// Fills `args` from `config` wherever the flag was not given on the command line.
///
/// # Errors
///
/// Returns an error when a config value is out of range.
pub fn apply_config(
    args: &mut StressArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    merge_string(&mut args.server, matches, "server", config.server.as_ref());
    if !is_cli(matches, "port")
        && let Some(port) = config.port
    {
        args.port = port.to_string();
    }
    merge_string(
        &mut args.client_id_prefix,
        matches,
        "client_id_prefix",
        config.client_id_prefix.as_ref(),
    );
    merge_bool(&mut args.random_suffix, matches, "random_suffix", config.random_suffix);
    if !is_cli(matches, "lifetime")
        && let Some(lifetime) = config.lifetime
    {
        args.lifetime = lifetime.to_string();
    }
    merge_string(&mut args.security, matches, "security", config.security.as_ref());
    merge_option(&mut args.psk_identity, matches, "psk_identity", config.psk_identity.as_ref());
    merge_option(&mut args.psk_key, matches, "psk_key", config.psk_key.as_ref());
    merge_option(&mut args.client_cert, matches, "client_cert", config.client_cert.as_ref());
    merge_option(&mut args.client_key, matches, "client_key", config.client_key.as_ref());
    merge_option(&mut args.server_cert, matches, "server_cert", config.server_cert.as_ref());
    merge_string(&mut args.binding, matches, "binding", config.binding.as_ref());

    if !is_cli(matches, "timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.timeout = timeout.to_duration()?;
    }
    if !is_cli(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = PositiveU64::try_from(requests).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "requests",
                source: err,
            })
        })?;
    }
    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = PositiveUsize::try_from(concurrency).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "concurrency",
                source: err,
            })
        })?;
    }
    merge_string(&mut args.label, matches, "label", config.label.as_ref());
    merge_bool(&mut args.no_deregister, matches, "no_deregister", config.no_deregister);
    merge_option(&mut args.output, matches, "output", config.output.as_ref());
    merge_bool(&mut args.fail_on_error, matches, "fail_on_error", config.fail_on_error);
    Ok(())
}

/// CoAP timing from the `[coap]` section, defaults elsewhere.
///
/// # Errors
///
/// Returns an error when a configured duration is invalid.
pub fn transmission_params(config: Option<&ConfigFile>) -> AppResult<TransmissionParams> {
    let mut params = TransmissionParams::default();
    let Some(coap) = config.and_then(|file| file.coap.as_ref()) else {
        return Ok(params);
    };
    if let Some(value) = coap.ack_timeout.as_ref() {
        params.ack_timeout = value.to_duration()?;
    }
    if let Some(value) = coap.max_retransmit {
        params.max_retransmit = value;
    }
    if let Some(value) = coap.separate_response_timeout.as_ref() {
        params.separate_response_timeout = value.to_duration()?;
    }
    if let Some(value) = coap.deregister_timeout.as_ref() {
        params.deregister_timeout = value.to_duration()?;
    }
    Ok(params)
}

fn merge_string(target: &mut String, matches: &ArgMatches, name: &str, value: Option<&String>) {
    if !is_cli(matches, name)
        && let Some(value) = value
    {
        target.clone_from(value);
    }
}

fn merge_option(
    target: &mut Option<String>,
    matches: &ArgMatches,
    name: &str,
    value: Option<&String>,
) {
    if !is_cli(matches, name)
        && let Some(value) = value
    {
        *target = Some(value.clone());
    }
}

fn merge_bool(target: &mut bool, matches: &ArgMatches, name: &str, value: Option<bool>) {
    if !is_cli(matches, name)
        && let Some(value) = value
    {
        *target = value;
    }
}
