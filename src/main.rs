//! bim-bridge: command-dispatch bridge over a building-model element graph
//!
//! Serves filtering queries, batch edits and transaction groups over stdio,
//! one JSON request per line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use bim_bridge::bridge::BridgeServer;
use bim_bridge::config::{self, Config, LogLevel};
use bim_bridge::dispatch::Session;
use bim_bridge::model::{Document, ElementGraph};

/// Command-dispatch bridge over a building-model element graph.
///
/// Reads `{tool, payload}` requests from stdin and writes responses to
/// stdout, one JSON object per line.
#[derive(Parser, Debug)]
#[command(name = "bim-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Model snapshot to serve (overrides `model_path` in the config)
    #[arg(short, long, value_name = "MODEL_FILE")]
    model: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    /// Command-line verbosity wins over the config file.
    fn log_level(&self, configured: LogLevel) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => configured.into(),
            (false, 1) => Level::INFO,
            (false, 2) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_notice() {
    eprintln!(
        "bim-bridge {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!();
}

/// Builds the session the server will own.
fn open_session(model: Option<PathBuf>, cfg: Config) -> Result<Session<Document>, ExitCode> {
    let export_dirs = cfg.export_dirs();
    let model_path = model.or(cfg.model_path);
    let document = config::open_model(model_path.as_deref()).map_err(|e| {
        error!(error = %e, "Cannot open model");
        eprintln!("Model error: {e}");
        ExitCode::FAILURE
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        title = document.title(),
        elements = document.element_count(),
        wrap_reads = cfg.transactions.wrap_reads,
        allowed_paths = ?export_dirs,
        "Model opened"
    );

    Ok(Session::new(document)
        .with_options(cfg.query.into())
        .with_wrapped_reads(cfg.transactions.wrap_reads)
        .with_allowed_paths(export_dirs))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("  caused by: {source}");
            }
            eprintln!("See config/example-config.json for the expected format");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.log_level(cfg.logging.level));
    print_notice();

    let session = match open_session(args.model, cfg) {
        Ok(session) => session,
        Err(code) => return code,
    };
    let mut server = BridgeServer::new(session);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!("Bridge ready, reading requests from stdin");
    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Bridge shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bridge I/O error");
            ExitCode::FAILURE
        }
    }
}
