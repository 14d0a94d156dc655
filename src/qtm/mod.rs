//! # Queue Task Manager
//!
//! Task lifecycle on top of a queue transport:
//!
//! ```text
//! publish ──► task (enabled) + one subtask per message
//! finish  ──► delete message, remove subtask, claim task when none remain
//! claim   ──► callback (best effort), execution-time log, task deleted
//! ```
//!
//! A disabled task never completes. Collaborators are passed to [`Qtm::new`]:
//! a [`TaskStore`], a [`CallbackNotifier`] and a [`crate::logging::Logger`].

pub mod callback;
pub mod errors;
pub mod manager;
pub mod memory_store;
pub mod task;
pub mod task_store;

pub use callback::{CallbackNotifier, HttpCallbackNotifier, NoopCallbackNotifier};
pub use errors::{TaskError, TaskResult};
pub use manager::Qtm;
pub use memory_store::InMemoryTaskStore;
pub use task::{ReceivedMessage, Subtask, Task, TaskMessage, TaskStatus};
pub use task_store::{PgTaskStore, TaskStore};
