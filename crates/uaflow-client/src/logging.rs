// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging setup.
//!
//! The runtime only emits `tracing` events. Where they go is decided by the
//! host: either a process-wide subscriber installed with [`init_logging`], or
//! a [`LogSink`] injected into one client so its worker logs somewhere else
//! without touching global state.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::{
    fmt as fmt_layer,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::error::{ConfigurationError, UaError, UaResult};

// =============================================================================
// LogFormat
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Compact single-line text.
    Compact,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Compact => f.write_str("compact"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(UaError::configuration(ConfigurationError::invalid_field(
                "logging.format",
                format!("unknown log format '{s}'"),
            ))),
        }
    }
}

// =============================================================================
// Global initialization
// =============================================================================

/// Installs a process-wide subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(level: &str, format: LogFormat) -> UaResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry.with(text_layer()).try_init(),
        LogFormat::Json => registry.with(json_layer()).try_init(),
        LogFormat::Compact => registry.with(compact_layer()).try_init(),
    };

    result.map_err(|e| {
        UaError::configuration(ConfigurationError::invalid_field("logging", e.to_string()))
    })
}

/// Parses a log level string, defaulting to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn parse_filter(level: &str) -> UaResult<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| {
        UaError::configuration(ConfigurationError::invalid_field("logging.level", e.to_string()))
    })
}

fn text_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
    fmt_layer::layer::<S>()
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(is_terminal)
}

fn json_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt_layer::layer::<S>()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
}

fn compact_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
    fmt_layer::layer::<S>()
        .compact()
        .with_target(false)
        .with_ansi(is_terminal)
}

// =============================================================================
// LogSink
// =============================================================================

/// A log destination injected into one client.
///
/// The connection worker runs under the sink's dispatcher, so every event it
/// emits, including those from continuations, goes to this sink.
///
/// # Examples
///
/// ```
/// use uaflow_client::logging::{LogFormat, LogSink};
///
/// let sink = LogSink::fmt("debug", LogFormat::Compact).unwrap();
/// tracing::dispatcher::with_default(sink.dispatch(), || {
///     tracing::debug!("routed to the sink");
/// });
/// ```
#[derive(Clone)]
pub struct LogSink {
    dispatch: Dispatch,
}

impl LogSink {
    /// Wraps an arbitrary subscriber.
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: Subscriber + Send + Sync + 'static,
    {
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Wraps an existing dispatcher.
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Builds a formatting sink writing to stdout.
    ///
    /// Unlike [`init_logging`], `RUST_LOG` is not consulted.
    pub fn fmt(level: &str, format: LogFormat) -> UaResult<Self> {
        let registry = tracing_subscriber::registry().with(parse_filter(level)?);
        let dispatch = match format {
            LogFormat::Text => Dispatch::new(registry.with(text_layer())),
            LogFormat::Json => Dispatch::new(registry.with(json_layer())),
            LogFormat::Compact => Dispatch::new(registry.with(compact_layer())),
        };
        Ok(Self { dispatch })
    }

    /// Builds a formatting sink from the logging section of a config.
    pub fn from_config(config: &LoggingConfig) -> UaResult<Self> {
        Self::fmt(&config.level, config.format)
    }

    /// Returns the dispatcher.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runs a future under this sink.
    pub fn attach<F: Future>(&self, future: F) -> WithDispatch<F> {
        future.with_subscriber(self.dispatch.clone())
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::Event;
    use tracing_subscriber::layer::Context;
    use tracing_subscriber::Layer;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0.lock().push(message);
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_fmt_sink_rejects_bad_filter() {
        assert!(LogSink::fmt("info", LogFormat::Json).is_ok());
        assert!(LogSink::fmt("=[", LogFormat::Text).is_err());
    }

    #[test]
    fn test_sink_captures_events() {
        let capture = Capture::default();
        let sink = LogSink::from_subscriber(tracing_subscriber::registry().with(capture.clone()));

        tracing::dispatcher::with_default(sink.dispatch(), || {
            tracing::info!("inside sink");
        });
        tracing::info!("outside sink");

        assert_eq!(capture.0.lock().as_slice(), ["inside sink"]);
    }

    #[tokio::test]
    async fn test_attached_future_logs_to_sink() {
        let capture = Capture::default();
        let sink = LogSink::from_subscriber(tracing_subscriber::registry().with(capture.clone()));

        sink.attach(async {
            tokio::task::yield_now().await;
            tracing::warn!("from future");
        })
        .await;

        assert_eq!(capture.0.lock().as_slice(), ["from future"]);
    }
}
