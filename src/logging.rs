//! Tracing subscriber setup for binaries and the dev server.
//!
//! Configuration comes from the environment:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `HUGROUTE_LOG_LEVEL` | `info` | base level when `RUST_LOG` is unset |
//! | `HUGROUTE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `HUGROUTE_LOG_ASYNC` | `false` | buffer output on a background writer |
//! | `HUGROUTE_LOG_BUFFER_SIZE` | `8192` | lines buffered when async |
//! | `HUGROUTE_LOG_TARGET_FILTER` | unset | extra comma-separated filter directives |
//! | `HUGROUTE_LOG_INCLUDE_LOCATION` | `false` | add file and line to events |

use std::env;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything other than `pretty` selects JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub async_logging: bool,
    pub buffer_size: usize,
    /// Comma-separated filter directives, e.g. `hugroute::api=debug`.
    pub target_filter: Option<String>,
    pub include_location: bool,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("HUGROUTE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("HUGROUTE_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            async_logging: env_parse("HUGROUTE_LOG_ASYNC").unwrap_or(false),
            buffer_size: env_parse("HUGROUTE_LOG_BUFFER_SIZE").unwrap_or(8192),
            target_filter: env::var("HUGROUTE_LOG_TARGET_FILTER").ok(),
            include_location: env_parse("HUGROUTE_LOG_INCLUDE_LOCATION").unwrap_or(false),
        }
    }

    /// Pretty, synchronous, debug level; for local development and tests.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            buffer_size: 1024,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        // Client disconnects are reported by the HTTP server at info.
        if let Ok(directive) = "may_minihttp=warn".parse() {
            filter = filter.add_directive(directive);
        }
        let extra = self.target_filter.as_deref().unwrap_or_default();
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("ignoring invalid log filter directive {directive:?}: {err}"),
            }
        }
        filter
    }
}

/// Install the global subscriber.
///
/// With async logging the returned guard flushes buffered lines on drop;
/// keep it alive for the life of the program.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(config.buffer_size)
            .finish(std::io::stdout());
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let layer = match (config.format, writer) {
        (LogFormat::Json, Some(writer)) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        (LogFormat::Json, None) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        (LogFormat::Pretty, Some(writer)) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        (LogFormat::Pretty, None) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`].
///
/// # Errors
///
/// See [`init_logging_with_config`].
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with_config(&LogConfig::from_env())
}
