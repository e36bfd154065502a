use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise structured JSON logging.
///
/// `RUST_LOG` controls the filter (default `info`). `log` records emitted by
/// actix and the request logger are bridged into the same subscriber.
/// Safe to call more than once; later calls are no-ops.
pub fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}
