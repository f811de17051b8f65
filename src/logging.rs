use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Sets up the global tracing subscriber with a fmt formatter and env filter.
///
/// The caller provides a fallback filter string that is used when `RUST_LOG` is
/// not set. Output goes to stderr so stdout stays free for the JSON summary.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
