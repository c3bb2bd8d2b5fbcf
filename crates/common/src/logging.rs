//! Logging utilities for hubwatch components.

use tracing_subscriber::EnvFilter;

/// Build the level filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Whether a configured log format asks for JSON lines.
pub fn is_json_format(format: Option<&str>) -> bool {
    matches!(format.map(str::to_ascii_lowercase).as_deref(), Some("json"))
}
