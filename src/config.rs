//! # Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! environment variables prefixed `QTM__` (for example `QTM__DATABASE__URL` or
//! `QTM__MESSAGING__QUEUE_PREFIX`). `DATABASE_URL` fills in an empty database URL.

use crate::constants::{defaults, DEFAULT_QUEUES};
use crate::error::{QtmError, QtmResult};
use crate::messaging::QueueDefaults;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "config/qtm.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QtmConfig {
    pub database: DatabaseConfig,
    pub messaging: MessagingConfig,
    pub worker: WorkerConfig,
    pub callback: CallbackConfig,
    pub tasks: TaskConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_seconds: defaults::CONNECT_TIMEOUT_SECONDS,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Queue names the task manager accepts
    pub queues: Vec<String>,
    /// Prepended to physical queue names as `<prefix>_<name>`
    pub queue_prefix: String,
    pub default_delay_seconds: u64,
    pub default_receive_limit: u32,
    pub default_visibility_timeout_seconds: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            queues: DEFAULT_QUEUES.iter().map(|q| q.to_string()).collect(),
            queue_prefix: String::new(),
            default_delay_seconds: defaults::DELAY_SECONDS,
            default_receive_limit: defaults::RECEIVE_LIMIT,
            default_visibility_timeout_seconds: defaults::VISIBILITY_TIMEOUT_SECONDS,
        }
    }
}

impl MessagingConfig {
    pub fn queue_defaults(&self) -> QueueDefaults {
        QueueDefaults {
            prefix: self.queue_prefix.clone(),
            delay_seconds: self.default_delay_seconds,
            receive_limit: self.default_receive_limit,
            visibility_timeout_seconds: self.default_visibility_timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Job names resolved through the consumer registry
    pub jobs: Vec<String>,
    pub sleep_seconds: u64,
    /// Wall-clock limit for a single unit of work
    pub work_timeout_seconds: u64,
    pub messages_to_receive: Option<u32>,
    pub message_visibility_timeout_seconds: Option<u64>,
    pub receive_wait_seconds: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            sleep_seconds: defaults::WORKER_SLEEP_SECONDS,
            work_timeout_seconds: defaults::WORK_TIMEOUT_SECONDS,
            messages_to_receive: None,
            message_visibility_timeout_seconds: None,
            receive_wait_seconds: None,
        }
    }
}

impl WorkerConfig {
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }

    pub fn work_timeout(&self) -> Duration {
        Duration::from_secs(self.work_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Sent as `Authorization: Bearer <token>`
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            timeout_ms: defaults::CALLBACK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Whether new tasks log their total execution time on completion
    pub track_time: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { track_time: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; the environment decides when unset
    pub level: Option<String>,
    pub json: bool,
    /// Directory for JSON log files; console only when unset
    pub log_dir: Option<String>,
}

impl QtmConfig {
    /// Load from `config/qtm.toml` (if present) and the environment
    pub fn load() -> QtmResult<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit file, which must exist when given
    pub fn load_from(path: Option<&Path>) -> QtmResult<Self> {
        let defaults = Config::try_from(&QtmConfig::default())?;

        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let environment = Environment::with_prefix("QTM")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("messaging.queues")
            .with_list_parse_key("worker.jobs");

        let mut config: QtmConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        if config.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }

        config.validate()?;
        debug!(
            queues = ?config.messaging.queues,
            jobs = ?config.worker.jobs,
            "⚙️ CONFIG: Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> QtmResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(QtmError::Configuration(
                "database.url is empty (set QTM__DATABASE__URL or DATABASE_URL)".to_string(),
            ));
        }
        if let Some(queue) = self.messaging.queues.iter().find(|q| q.trim().is_empty()) {
            return Err(QtmError::Configuration(format!(
                "messaging.queues contains an empty name: {queue:?}"
            )));
        }
        if self.messaging.default_receive_limit == 0 {
            return Err(QtmError::Configuration(
                "messaging.default_receive_limit must be greater than zero".to_string(),
            ));
        }
        if self.worker.work_timeout_seconds == 0 {
            return Err(QtmError::Configuration(
                "worker.work_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.worker.messages_to_receive == Some(0) {
            return Err(QtmError::Configuration(
                "worker.messages_to_receive must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
