//! Tracing subscriber setup for hosts embedding the controller.

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `default_level` when the
/// variable is unset or invalid. Calling this more than once is harmless: only
/// the first subscriber is installed.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("trace");
        tracing::debug!("logging initialized twice without panicking");
    }
}
