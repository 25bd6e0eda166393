//! keyssh - ssh with one agent per identity key
//!
//! Drop-in replacement for `ssh`: picks the key for the destination, makes
//! sure that key's own agent is running, then execs the real client with
//! `SSH_AUTH_SOCK` pointing at it.

use anyhow::{Context, Result};
use launcher::{LaunchError, Launcher};
use settings::constants;
use std::convert::Infallible;
use tracing::{debug, error};

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var(constants::env::DEBUG).is_ok()
}

/// Initialize the logging system.
///
/// Everything goes to stderr; stdout belongs to the remote session.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "keyssh=trace,launcher=trace,agent_store=trace,ssh_config=trace,command_line=trace,settings=debug,warn"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(is_debug_mode())
                .without_time(),
        )
        .with(filter)
        .init();

    debug!("keyssh v{} starting up", env!("CARGO_PKG_VERSION"));
}

fn run() -> Result<Infallible> {
    let config = settings::load_config();
    let launcher = Launcher::new(config);

    let handoff = launcher.prepare(std::env::args_os().skip(1))?;
    handoff.run_local_command();

    let program = handoff.program().to_path_buf();
    Err(handoff.exec()).with_context(|| format!("Failed to exec {}", program.display()))
}

fn main() {
    init_logging();

    let e = match run() {
        Ok(never) => match never {},
        Err(e) => e,
    };
    error!("{:#}", e);
    let code = match e.downcast_ref::<LaunchError>() {
        Some(launch_error) => launch_error.exit_code(),
        None => constants::client::EXEC_FAILURE_EXIT_CODE,
    };
    std::process::exit(code);
}
