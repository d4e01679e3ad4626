use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `TL_LOG=tasklane=debug`
pub const LOG_ENV: &str = "TL_LOG";

const DEFAULT_FILTER: &str = "warn";

fn filter(verbose: bool) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::new(spec),
        _ if verbose => EnvFilter::new("tasklane=debug,warn"),
        _ => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Log to stderr (CLI commands)
pub fn init_stderr(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to `<data_dir>/tl.log` so output does not land on the TUI's
/// alternate screen. Falls back to no logging if the file cannot be opened.
pub fn init_file(data_dir: &Path) {
    let path = data_dir.join("tl.log");
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(false))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}
