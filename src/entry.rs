use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::{info, warn};

use crate::args::{Command, StressArgs};
use crate::coap::{TransmissionParams, UdpClientFactory};
use crate::config::{DEFAULT_CONFIG_FILES, apply_config, load_config, transmission_params};
use crate::error::{AppError, AppResult, ValidationError};
use crate::registration::{BlockingSampler, ClientFactory, SampleExecutor};
use crate::runner::{LoadSettings, outcome_lines, print_lines, run_load, summary_lines};
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

/// CLI entry point.
///
/// # Errors
///
/// Returns an error for invalid arguments or config, for I/O failures, and
/// for failed samples when `--fail-on-error` is set (or under `once`).
pub fn run() -> AppResult<()> {
    let Some((mut args, matches)) = parse_args()? else {
        return Ok(());
    };

    crate::logger::init_logging(args.verbose, args.no_color);

    let config = load_config(args.config.as_deref())?;
    if let Some(config) = config.as_ref() {
        apply_config(&mut args, &matches, config)?;
    }
    let transmission = transmission_params(config.as_ref())?;
    let executor = build_executor(&args, transmission);

    match args.command {
        Some(Command::Once) => run_once(&args, executor),
        None => run_load_command(&args, &executor),
    }
}

fn parse_args() -> AppResult<Option<(StressArgs, ArgMatches)>> {
    let mut cmd = StressArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = StressArgs::from_arg_matches(&matches)?;
    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    treat_as_empty && !has_default_config()
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

fn build_executor(args: &StressArgs, transmission: TransmissionParams) -> SampleExecutor {
    let factory: Arc<dyn ClientFactory> = Arc::new(UdpClientFactory::new(transmission));
    SampleExecutor::new(factory)
        .with_teardown(args.teardown())
        .with_label(args.label.clone())
}

fn run_once(args: &StressArgs, executor: SampleExecutor) -> AppResult<()> {
    let sampler = BlockingSampler::new(executor)?;
    let outcome = sampler.run_params(&args.to_params(), args.timeout);
    print_lines(&outcome_lines(&outcome));
    if outcome.is_success() {
        Ok(())
    } else {
        Err(AppError::validation(ValidationError::SamplesFailed {
            failed: 1,
            total: 1,
        }))
    }
}

fn run_load_command(args: &StressArgs, executor: &SampleExecutor) -> AppResult<()> {
    let settings = LoadSettings {
        params: args.to_params(),
        timeout: args.timeout,
        requests: args.requests.get(),
        concurrency: args.concurrency.get(),
        output: args.output.as_ref().map(PathBuf::from),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lwm2m-stress")
        .build()?;

    let report = runtime.block_on(async {
        let (shutdown_tx, _) = shutdown_channel();
        let signal_handler = setup_signal_shutdown_handler(&shutdown_tx);
        let report = run_load(&settings, executor, &shutdown_tx).await;
        drop(shutdown_tx.send(()));
        signal_handler.await?;
        report
    })?;

    print_lines(&summary_lines(&report.summary, executor.label()));
    if let Some(path) = settings.output.as_ref() {
        info!("Sample records written to {}", path.display());
    }
    if report.interrupted {
        warn!("Run was interrupted; the summary covers completed samples only.");
    }

    let failed = report.summary.failed();
    if args.fail_on_error && failed > 0 {
        return Err(AppError::validation(ValidationError::SamplesFailed {
            failed,
            total: report.summary.total,
        }));
    }
    Ok(())
}
