//! Structured logging setup.
//!
//! Foreground runs log compact, colorless lines to stderr. `VIBE_DEBUG=true`
//! additionally routes a copy to a daily-rolling file named `vibe.log` under
//! the data directory, for sessions that also want a durable trail.

use tracing_subscriber::fmt::format;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use std::path::Path;

/// Truncate long field values (e.g. a full rendered prompt) so a verbose log
/// stays readable. Returns the truncated text and whether truncation occurred.
fn truncate_for_log(message: &str, max_chars: usize) -> (&str, bool) {
    match message.char_indices().nth(max_chars) {
        Some((byte_index, _character)) => (&message[..byte_index], true),
        None => (message, false),
    }
}

const MAX_FIELD_CHARS: usize = 500;

fn field_formatter() -> format::DebugFn<impl Fn(&mut format::Writer<'_>, &tracing::field::Field, &dyn std::fmt::Debug) -> std::fmt::Result + Clone> {
    format::debug_fn(|writer, field, value| {
        let formatted = format!("{value:?}");
        let (truncated, was_truncated) = truncate_for_log(&formatted, MAX_FIELD_CHARS);
        if was_truncated {
            write!(writer, "{}={truncated}...", field.name())
        } else {
            write!(writer, "{}={formatted}", field.name())
        }
    })
}

fn build_env_filter(debug: bool) -> tracing_subscriber::EnvFilter {
    if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::new("info")
    }
}

/// Initialize the global tracing subscriber.
///
/// When `debug` is true, also writes a daily-rolling `vibe.log` under
/// `data_dir`. Returns the non-blocking writer guard; the caller must hold
/// it for the process lifetime or log lines after it drops will be lost.
pub fn init(debug: bool, data_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = build_env_filter(debug);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .fmt_fields(field_formatter())
        .compact();

    if !debug {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(data_dir, "vibe.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .fmt_fields(field_formatter())
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_for_log_passes_short_text_through() {
        let (text, truncated) = truncate_for_log("hello", 500);
        assert_eq!(text, "hello");
        assert!(!truncated);
    }

    #[test]
    fn truncate_for_log_cuts_long_text() {
        let long = "a".repeat(1000);
        let (text, truncated) = truncate_for_log(&long, 10);
        assert_eq!(text.len(), 10);
        assert!(truncated);
    }
}
