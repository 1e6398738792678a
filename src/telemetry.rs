use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = match config.format.as_deref() {
        Some("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
}
