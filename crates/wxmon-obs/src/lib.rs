use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when RUST_LOG is unset or unparsable
pub const DEFAULT_FILTER: &str = "info,wxmon=debug";

/// Initialize logging
/// - JSON lines on stdout
/// - RUST_LOG respected; default to "info,wxmon=debug"
///
/// Returns false if a global subscriber was already installed, in which
/// case the existing one stays in place.
pub fn init(service_name: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Logging initialized");
    }
    installed
}
