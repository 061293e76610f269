use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins when it parses; otherwise
/// the service and actix-web both log at `level`.
pub fn init_telemetry(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(level).into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn default_directives(level: &str) -> String {
    format!("match_backend={level},actix_web={level}")
}
