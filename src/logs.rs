use {
    std::io,
    tracing_appender::{non_blocking, non_blocking::WorkerGuard},
    tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt},
};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Logs go to stderr through a background writer that
/// stays alive as long as the returned guard.
pub(crate) fn init() -> WorkerGuard {
    let (writer, guard) = non_blocking(io::stderr());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(writer)
                .with_filter(filter),
        )
        .init();

    guard
}
