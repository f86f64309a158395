// ABOUTME: Shared logging setup for rivershade binaries
// ABOUTME: init() and init_verbose() log to stderr, init_file() writes the trace log

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    init_verbose(false);
}

/// Stderr logging at DEBUG when `verbose`, INFO otherwise. RUST_LOG still overrides.
pub fn init_verbose(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Where the trace log for `app_name` lives: ~/.config/rivershade/{app_name}.log
pub fn log_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rivershade").join(format!("{app_name}.log")))
}

/// Append-only trace log for interactive commands. Default: WARN level, RUST_LOG override.
/// If setup fails, prints a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) {
    if let Err(e) = init_file_inner(app_name) {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

fn init_file_inner(app_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = log_path(app_name).ok_or("could not determine config directory")?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_ansi(false)
        .init();

    Ok(())
}
