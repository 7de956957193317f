use std::io;
use tracing_subscriber::EnvFilter;

/// Overrides the verbosity flags with a full `EnvFilter` directive.
pub(crate) const LOG_ENV: &str = "BRANCH_DIFF_LOG";

/// Install the global subscriber. Logs go to stderr; stdout only ever holds
/// the JSON result.
pub(crate) fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    // Fails only if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}
