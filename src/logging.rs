//! Log output setup.
//!

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, so stdout carries only command output (MAP tables,
/// STATUS answers). Defaults to INFO; override with `RUST_LOG`, e.g.
/// `RUST_LOG=meteolite=debug`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
