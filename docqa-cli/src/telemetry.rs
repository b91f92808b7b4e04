//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so answers on stdout stay clean.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
pub fn init(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
