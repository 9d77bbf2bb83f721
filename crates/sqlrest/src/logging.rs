// Console logging for the CLI.
//
// Library crates log through the `log` facade; `tracing_log::LogTracer`
// forwards those records into the tracing subscriber installed here.

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "warn";

/// `level` takes precedence over `RUST_LOG`; both accept filter directives
/// such as `debug` or `sqlrest_engine=debug,warn`.
pub fn init(level: Option<&str>) -> Result<(), String> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| format!("invalid log filter '{level}': {e}"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    };

    tracing_log::LogTracer::init().map_err(|e| format!("log bridge: {e}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| format!("log subscriber: {e}"))
}
