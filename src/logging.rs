use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber. `RUST_LOG` wins; default is info-level
/// for the crate target. Safe to call more than once (tests).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sacristia=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
