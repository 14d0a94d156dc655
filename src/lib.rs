#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, JSONB in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Queue Task Manager
//!
//! A thin orchestration layer atop a message queue that groups related asynchronous
//! messages into a *task*, tracks how many messages remain outstanding for that task,
//! and fires a completion callback exactly once when the last outstanding message is
//! acknowledged.
//!
//! ## Module Organization
//!
//! - [`query_builder`] - Declarative SELECT/INSERT/UPDATE/DELETE rendering with
//!   relational and JSONB document field modes
//! - [`database`] - Single-connection storage access layer with check-and-heal,
//!   transactions and row shaping
//! - [`messaging`] - Queue transports: a PostgreSQL-backed queue with visibility
//!   timeouts and an in-memory transport
//! - [`qtm`] - Task lifecycle, subtask accounting, completion detection and callbacks
//! - [`worker`] - Consumer registry and the polling worker loop
//! - [`config`] - Layered configuration (defaults, TOML file, `QTM__` environment)
//! - [`logging`] - Structured logging and the injectable [`logging::Logger`] capability
//! - [`error`] - Crate-level error aggregation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qtm::logging::TracingLogger;
//! use qtm::messaging::{InMemoryQueue, PublishOptions, QueueDefaults};
//! use qtm::qtm::{InMemoryTaskStore, NoopCallbackNotifier, Qtm};
//!
//! # async fn example() -> qtm::QtmResult<()> {
//! let logger = Arc::new(TracingLogger);
//! let manager = Qtm::new(
//!     Arc::new(InMemoryTaskStore::new()),
//!     Arc::new(NoopCallbackNotifier),
//!     logger,
//! )
//! .with_queue("url", Arc::new(InMemoryQueue::new("url", QueueDefaults::default())));
//!
//! let mut message = serde_json::Map::new();
//! message.insert("url".into(), serde_json::json!("http://example.com"));
//! let (message_id, task_id) = manager
//!     .publish("url", message, None, None, &PublishOptions::default())
//!     .await?;
//! println!("published {message_id} for task {task_id}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod qtm;
pub mod query_builder;
pub mod worker;

pub use config::QtmConfig;
pub use error::{QtmError, QtmResult};
pub use logging::{LogContext, LogLevel, Logger};
pub use query_builder::{Query, QueryKind};
