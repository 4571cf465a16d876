//! Logging and observability
//!
//! Structured logging via tracing-subscriber with text or JSON output,
//! selected at runtime by CLI flag or environment variable (no feature
//! flags). All log output goes to stderr so stdout stays reserved for
//! command output, which matters for the machine-readable `menu` and
//! `status` commands.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the logging system with optional format specification
///
/// Sets up tracing-subscriber with either JSON or text formatting. Safe to
/// call multiple times; subsequent calls are no-ops.
///
/// ## Arguments
///
/// * `format` - `None` or `"text"` for human-readable output, `"json"` for
///   structured JSON
///
/// ## Environment Variables
///
/// * `FUSIONCTL_LOG_FORMAT` - log output format ("json" for JSON, anything
///   else for text); a `format` argument takes precedence
/// * `FUSIONCTL_LOG` - logging filter specification
/// * `RUST_LOG` - standard fallback filter
/// * `FUSIONCTL_LOG_SPAN_EVENTS` - span lifecycle events to emit
///   ("new", "close", "enter", "exit", "active", "full", comma-separated)
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        let env_format = std::env::var("FUSIONCTL_LOG_FORMAT").ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");

        // Span lifecycle verbosity defaults depend on format: text stays
        // quiet, json keeps NEW|CLOSE for tooling
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

/// Create an EnvFilter based on environment variables
fn create_env_filter() -> EnvFilter {
    if let Ok(spec) = std::env::var("FUSIONCTL_LOG") {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid FUSIONCTL_LOG specification '{}', using default 'info'",
                spec
            );
            EnvFilter::new("info")
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Determine span lifecycle event configuration based on env var and format
fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var("FUSIONCTL_LOG_SPAN_EVENTS") {
        let mut acc = FmtSpan::NONE;
        for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
            acc |= match token.as_str() {
                "none" => FmtSpan::NONE,
                "new" => FmtSpan::NEW,
                "close" => FmtSpan::CLOSE,
                "enter" => FmtSpan::ENTER,
                "exit" => FmtSpan::EXIT,
                "active" => FmtSpan::ACTIVE,
                "full" => FmtSpan::FULL,
                _ => FmtSpan::NONE,
            };
        }
        return acc;
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize tests that touch the global subscriber
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_init_multiple_calls_safe() {
        let _guard = TEST_MUTEX.lock().unwrap();

        assert!(init(None).is_ok());
        assert!(init(Some("json")).is_ok());
        assert!(init(Some("text")).is_ok());
    }

    #[test]
    fn test_init_format_fallback() {
        let _guard = TEST_MUTEX.lock().unwrap();

        // Unknown formats fall back to text
        assert!(init(Some("invalid")).is_ok());
    }

    #[test]
    fn test_env_filter_with_env_vars() {
        std::env::set_var("FUSIONCTL_LOG", "trace");
        let _filter = create_env_filter();
        std::env::remove_var("FUSIONCTL_LOG");

        std::env::set_var("RUST_LOG", "warn");
        let _filter = create_env_filter();
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_span_events_parsing() {
        std::env::set_var("FUSIONCTL_LOG_SPAN_EVENTS", "new,close");
        let _events = span_events_for_format("text");
        std::env::remove_var("FUSIONCTL_LOG_SPAN_EVENTS");
    }

    #[test]
    fn test_is_initialized() {
        let _guard = TEST_MUTEX.lock().unwrap();

        let _ = init(None);
        assert!(is_initialized());
    }
}
