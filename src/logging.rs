//! Logging setup
//!
//! ## Environment Variables
//!
//! 1. **`TINY_HIGHLIGHT_LOG`** (highest priority) - a bare level such as
//!    `debug` applies to this crate only; anything with `=`, `:` or `,` is
//!    used as a full filter
//! 2. **`RUST_LOG`** - Standard tracing environment variable
//! 3. **Default** - `warn` globally, `info` for this crate

use std::env;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

const LOG_VAR: &str = "TINY_HIGHLIGHT_LOG";
const CRATE_TARGET: &str = "tiny_highlight";

/// Install a stderr fmt subscriber
///
/// Fails if a global subscriber is already set.
pub fn init() -> Result<(), InitError> {
    fmt()
        .with_env_filter(create_filter())
        .with_writer(std::io::stderr)
        .try_init()
}

/// Initialize logging for tests; safe to call from every test
pub fn test() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_test_writer()
        .try_init();
}

fn create_filter() -> EnvFilter {
    if let Ok(level) = env::var(LOG_VAR) {
        return EnvFilter::new(expand(&level));
    }

    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    EnvFilter::new(expand("info"))
}

fn expand(level: &str) -> String {
    if level.contains('=') || level.contains(':') || level.contains(',') {
        return level.to_string();
    }
    format!("warn,{CRATE_TARGET}={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_bare_level() {
        assert_eq!(expand("debug"), "warn,tiny_highlight=debug");
        assert_eq!(expand("tiny_highlight::engine=trace"), "tiny_highlight::engine=trace");
        assert_eq!(expand("info,regex=debug"), "info,regex=debug");
    }

    #[test]
    fn test_is_repeat_safe() {
        test();
        test();
        tracing::info!("logging initialized twice");
    }
}
