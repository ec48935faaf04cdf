//! Structured logging on stderr.
//!
//! Filter precedence: the `AGENT_PLUGINS_LOG` environment variable, then the
//! level passed on the command line, then `warn`.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Registry, fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "AGENT_PLUGINS_LOG";

/// Default level when nothing else is configured.
pub const DEFAULT_LEVEL: &str = "warn";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidArgument(format!(
                "unknown log format '{other}' (expected text or json)"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging options resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Level or directive, e.g. `info` or `agent_plugins=debug`.
    pub level: Option<String>,
    pub format: LogFormat,
    pub color: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Text,
            color: true,
        }
    }
}

/// Installs the global subscriber. Call once, from the binary.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an unparsable level directive.
pub fn init(options: &LogOptions) -> Result<()> {
    let filter = build_filter(options.level.as_deref())?;
    let subscriber = Registry::default().with(filter);

    let installed = match options.format {
        LogFormat::Json => subscriber
            .with(
                layer_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => subscriber
            .with(
                layer_fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(options.color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    // A subscriber set earlier (tests, embedding) keeps precedence.
    let _ = installed;
    Ok(())
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    let directive = level.unwrap_or(DEFAULT_LEVEL);
    EnvFilter::try_new(directive)
        .map_err(|e| Error::InvalidArgument(format!("invalid log level '{directive}': {e}")))
}
