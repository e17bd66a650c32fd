use eyre::{Result, anyhow};

#[macro_export]
macro_rules! try_log_error {
    ($expr:expr, $what:expr $(,)?) => {
        if let Err(e) = $expr {
            tracing::error!("{}: {}", $what, e)
        }
    };
}

/// Installs a stderr subscriber filtered by `RUST_LOG`, `info` when unset.
pub fn start_logging() -> Result<()> {
    use std::io::stderr;

    use tracing_subscriber::{Layer, Registry, fmt, layer::SubscriberExt};

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = Registry::default().with(
        fmt::layer()
            .without_time()
            .with_writer(stderr)
            .with_filter(filter),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Unable to set global subscriber: {e}"))
}
