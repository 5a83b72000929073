//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so they never mix with passwords printed by `-r` or `-g`.

use crate::constants::{
    DEBUG_LOG_LEVEL, DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, LOG_FORMAT_TEXT, TRACING_ROOT_SPAN_NAME,
    TRACING_SERVICE_NAME,
};
use std::io;
use tracing::Span;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};
use uuid::Uuid;

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Reads the value of `MDP_LOG_FORMAT`. Unknown values fall back to text.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case(LOG_FORMAT_JSON) => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case(LOG_FORMAT_TEXT) => LogFormat::Text,
            _ => LogFormat::Text,
        }
    }
}

/// The filter directive used when `RUST_LOG` is not set.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        DEBUG_LOG_LEVEL
    } else {
        DEFAULT_LOG_LEVEL
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `warn`, or `debug`
/// with `-d`. Calling this twice is harmless: the second call leaves the
/// first subscriber in place.
pub fn init(debug: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let registry = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Opens the span that every log line of this invocation is recorded in.
pub fn root_span() -> Span {
    tracing::info_span!(
        TRACING_ROOT_SPAN_NAME,
        service_name = TRACING_SERVICE_NAME,
        invocation_id = %Uuid::new_v4(),
    )
}
