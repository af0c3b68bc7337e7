// SPDX-License-Identifier: Apache-2.0

use access_sdk::Bridge;
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use scripted_access::init::args::CheckRun;
use scripted_access::init::config::AccessConfig;
use scripted_access::worker::Worker;
use std::io::Read;
use std::process::ExitCode;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Load the script once and decide each request in order
    Check(Box<CheckRun>),

    Version,
}

#[derive(Debug, Parser)]
#[command(name = "scripted-access")]
#[command(bin_name = "scripted-access")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "SCRIPTED_ACCESS_LOG_FORMAT",
        default_value = "text"
    )]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Check(check)) => {
            let _guard = match setup_logging(&opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = run_check(*check) {
                error!(error = e, "Failed to run access check.");
                return ExitCode::from(1);
            }
        }
        None => {
            eprintln!("ERROR: must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

fn run_check(check: CheckRun) -> Result<(), BoxError> {
    let config = AccessConfig::from_args(&check.access)?;
    let bridge = Bridge::load(config.bridge.clone())?;
    let worker = Worker::new(bridge, &config);

    let mut unreadable = 0;
    for source in &check.requests {
        let raw = match read_request(source) {
            Ok(raw) => raw,
            Err(e) => {
                error!(source = %source, error = e, "Unable to read request.");
                unreadable += 1;
                continue;
            }
        };

        let outcome = worker.process(raw);
        println!("{}\t{}", source, outcome.decision);
    }

    info!(requests = check.requests.len(), unreadable, "Access check finished.");
    if unreadable > 0 {
        return Err(format!("{} request(s) could not be read", unreadable).into());
    }
    Ok(())
}

fn read_request(source: &str) -> Result<Bytes, BoxError> {
    let mut buf = Vec::new();
    if source == "-" {
        std::io::stdin().read_to_end(&mut buf)?;
    } else {
        buf = std::fs::read(source)?;
    }
    Ok(Bytes::from(buf))
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

// Decisions go to stdout, so logs are written to stderr.
fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        let use_ansi = io::stderr().is_terminal();

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(true)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}
