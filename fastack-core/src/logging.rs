//! Structured logging for Fastack applications.
//!
//! Configurable format, destination, and level filtering. Defaults to
//! JSON output on STDOUT so logs ship straight into collectors.
//!
//! # Examples
//!
//! ```no_run
//! use fastack_core::logging::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     // JSON to STDOUT at INFO
//!     let _guard = LogConfig::default().init();
//!
//!     info!("Application started");
//! }
//! ```
//!
//! ```no_run
//! use fastack_core::logging::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LogConfig::new()
//!         .level(LogLevel::Debug)
//!         .format(LogFormat::Pretty)
//!         .with_colors(true)
//!         .with_thread_ids(true);
//!
//!     let _guard = config.init();
//!
//!     debug!("Pretty logging for development");
//! }
//! ```

use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Convert to string for EnvFilter
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format (default) - structured, machine-readable
    Json,
    /// Plain text format - simple, human-readable
    Plain,
    /// Pretty format - colored, formatted for development
    Pretty,
    /// Compact format - minimal output
    Compact,
}

/// Output destination for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Write to STDOUT (default)
    Stdout,
    /// Write to STDERR
    Stderr,
    /// Write to a single file
    File(String),
}

/// Logging configuration
///
/// # Examples
///
/// ```
/// use fastack_core::logging::*;
///
/// let config = LogConfig::new()
///     .level(LogLevel::Debug)
///     .format(LogFormat::Plain)
///     .output(LogOutput::Stderr);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Output destination
    pub output: LogOutput,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Include target (module path)
    pub targets: bool,
    /// Include file and line numbers
    pub file_line: bool,
    /// Include span information
    pub spans: bool,
    /// Enable ANSI colors (for terminal output)
    pub colors: bool,
    /// Custom environment filter (overrides level if set)
    pub env_filter: Option<String>,
}

impl LogConfig {
    /// Create a new logging configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log level
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set output format
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set output destination
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Enable or disable thread IDs
    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    /// Enable or disable target (module path)
    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Enable or disable file and line numbers
    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    /// Enable or disable span information
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set custom environment filter
    ///
    /// This allows complex filtering like "fastack=debug,hyper=info"
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Initialize the logging system
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program. When dropped, the logger will flush remaining logs.
    ///
    /// ```no_run
    /// # use fastack_core::logging::*;
    /// #[tokio::main]
    /// async fn main() {
    ///     let _guard = LogConfig::default().init();
    ///     info!("Logging initialized");
    /// } // guard dropped here, logs flushed
    /// ```
    pub fn init(self) -> Option<WorkerGuard> {
        let env_filter = if let Some(filter_str) = &self.env_filter {
            EnvFilter::try_new(filter_str)
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
        } else {
            // FASTACK_LOG overrides the configured level when set
            EnvFilter::try_from_env("FASTACK_LOG")
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
        };

        match &self.output {
            LogOutput::Stdout => {
                let (non_blocking, guard) = tracing_appender::non_blocking(io::stdout());
                self.init_with_writer(non_blocking, env_filter);
                Some(guard)
            }
            LogOutput::Stderr => {
                let (non_blocking, guard) = tracing_appender::non_blocking(io::stderr());
                self.init_with_writer(non_blocking, env_filter);
                Some(guard)
            }
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .expect("Failed to open log file");
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                self.init_with_writer(non_blocking, env_filter);
                Some(guard)
            }
        }
    }

    /// Initialize with a specific writer
    fn init_with_writer<W>(&self, writer: W, env_filter: EnvFilter)
    where
        W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let fmt_span = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.format {
            LogFormat::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(self.spans)
                    .with_span_list(self.spans)
                    .with_target(self.targets)
                    .with_thread_ids(self.thread_ids)
                    .with_file(self.file_line)
                    .with_line_number(self.file_line)
                    .with_span_events(fmt_span);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .init();
            }
            LogFormat::Plain => {
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_thread_ids(self.thread_ids)
                    .with_file(self.file_line)
                    .with_line_number(self.file_line)
                    .with_ansi(self.colors)
                    .with_span_events(fmt_span);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .init();
            }
            LogFormat::Pretty => {
                let layer = fmt::layer()
                    .pretty()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_thread_ids(self.thread_ids)
                    .with_file(self.file_line)
                    .with_line_number(self.file_line)
                    .with_ansi(self.colors)
                    .with_span_events(fmt_span);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .init();
            }
            LogFormat::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_thread_ids(self.thread_ids)
                    .with_file(false) // Compact doesn't show file/line
                    .with_line_number(false)
                    .with_ansi(self.colors)
                    .with_span_events(fmt_span);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer)
                    .init();
            }
        }
    }
}

impl Default for LogConfig {
    /// Default configuration: JSON format to STDOUT at INFO level
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false, // Disabled for JSON
            env_filter: None,
        }
    }
}
