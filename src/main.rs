//! sidecar-launcher: supervisory launcher for a sidecar network proxy.
//!
//! Entry point for the binary. It parses the command line, sets up
//! diagnostics on stderr and hands over to the orchestrator.
//!
//! # I/O Architecture
//!
//! - **stdout**: user-facing notices, helper script output and the relayed
//!   proxy output, in that order of appearance
//! - **stderr**: fatal errors, the usage line and `tracing` diagnostics
//!   (including the JSON lifecycle events)

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use sidecar_launcher::{cli::Cli, config::ConfigError, orchestrator, telemetry};
use tracing::debug;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_tracing(cli.verbose) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    debug!("Parsed CLI arguments: {:?}", cli);

    let code = match orchestrator::run(&cli) {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    };

    let _ = std::io::stdout().flush();
    code
}

/// Print a fatal error to stderr. Usage errors print only the usage line.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Usage { usage }) => eprintln!("{}", usage),
        _ => eprintln!("error: {:#}", err),
    }
}
