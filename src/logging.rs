//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so stdout stays clean for JSON results. `RUST_LOG`
//! takes precedence over the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Base level plus quieter defaults for the HTTP stack.
/// Directive strings (containing ',' or '=') are used as-is.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains(',') || level.contains('=') {
        level.to_string()
    } else {
        format!("{},hyper=info,hyper_util=info,reqwest=info,alloy_transport_http=info", level)
    }
}

pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!("Logging initialized (level {}, {})", level, if json { "json" } else { "compact" });
    }
}
