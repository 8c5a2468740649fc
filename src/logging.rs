//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the verbosity flags.
///
/// `RUST_LOG`, when set, takes precedence over this.
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "urlsift=debug,warn"
    } else {
        "warn"
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Calling this twice keeps the first subscriber.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
