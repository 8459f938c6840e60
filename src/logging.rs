//! `tracing` setup for the binary. Logs go to stderr so they never mix with
//! command output or the LSP stream on stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `log_level` overrides `RUST_LOG`; without either, `warn` is used. Calling
/// this twice is harmless.
pub fn init_logger(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    // a subscriber may already be installed by tests or an embedding program
    let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init_logger(Some("debug"));
        init_logger(None);
        tracing::debug!("logger installed");
    }
}
