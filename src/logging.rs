//! # Structured Logging Module
//!
//! Environment-aware structured logging on `tracing`, plus the [`Logger`] capability
//! that the task manager, queue transports and worker receive by injection.

use crate::config::LoggingConfig;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Key-value context attached to a log entry
pub type LogContext = Map<String, Value>;

/// Build a [`LogContext`] from `key => value` pairs
#[macro_export]
macro_rules! log_context {
    () => { $crate::logging::LogContext::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut context = $crate::logging::LogContext::new();
        $( context.insert(($key).to_string(), ::serde_json::json!($value)); )+
        context
    }};
}

/// Severity levels, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }
}

/// Structured logging capability
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);

    fn debug(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Debug, message, context);
    }

    fn info(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Info, message, context);
    }

    fn notice(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Notice, message, context);
    }

    fn warning(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Warning, message, context);
    }

    fn error(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Error, message, context);
    }

    fn critical(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Critical, message, context);
    }

    fn alert(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Alert, message, context);
    }

    fn emergency(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Emergency, message, context);
    }
}

/// Forwards entries to `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let context = Value::Object(context.clone());
        let severity = level.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(%context, "{message}"),
            LogLevel::Info | LogLevel::Notice => tracing::info!(severity, %context, "{message}"),
            LogLevel::Warning => tracing::warn!(%context, "{message}"),
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                tracing::error!(severity, %context, "{message}")
            }
        }
    }
}

/// A captured log entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
}

/// Keeps entries in memory; used to assert on what the core logged
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Whether any entry at `level` contains `needle` in its message
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.to_string(),
            context: context.clone(),
        });
    }
}

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(log_level.clone()))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(log_level.clone()))
                .boxed()
        };

        let mut file_path = None;
        let file_layer = config.log_dir.as_ref().and_then(|dir| {
            let log_dir = PathBuf::from(dir);
            if let Err(e) = fs::create_dir_all(&log_dir) {
                eprintln!("Failed to create log directory {}: {e}", log_dir.display());
                return None;
            }

            let file_name = format!("{}.{}.log", environment, process::id());
            file_path = Some(log_dir.join(&file_name));
            let appender = tracing_appender::rolling::never(&log_dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The writer flushes until process exit
            std::mem::forget(guard);

            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
        });

        let subscriber = tracing_subscriber::registry().with(console).with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_file = ?file_path,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("QTM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
