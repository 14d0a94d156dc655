//! # Task Error Types
//!
//! Task-consistency failures carry the offending task id so log lines can be
//! traced back to a task.

use crate::database::DatabaseError;
use crate::messaging::MessagingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Error saving task (task:{task_id}): {message}")]
    TaskSave { task_id: String, message: String },

    #[error("Error adding sub task (task:{task_id}): {message}")]
    SubtaskSave { task_id: String, message: String },

    #[error("Error removing sub task {message_id} (task:{task_id}): {message}")]
    SubtaskRemove {
        task_id: String,
        message_id: i64,
        message: String,
    },

    #[error("Error deleting task (task:{task_id}): {message}")]
    TaskDelete { task_id: String, message: String },

    #[error("Error updating task status (task:{task_id}): {message}")]
    StatusUpdate { task_id: String, message: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Message cannot be identified: {0}")]
    MessageNotFound(String),

    #[error("Callback to {url} failed: {message}")]
    Callback { url: String, message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl TaskError {
    pub fn task_save(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskSave {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    pub fn subtask_save(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SubtaskSave {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    pub fn subtask_remove(task_id: impl Into<String>, message_id: i64, message: impl Into<String>) -> Self {
        Self::SubtaskRemove {
            task_id: task_id.into(),
            message_id,
            message: message.into(),
        }
    }

    pub fn task_delete(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskDelete {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    pub fn status_update(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatusUpdate {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    pub fn callback(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Callback {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn is_connection_broken(&self) -> bool {
        match self {
            TaskError::Database(e) => e.is_connection_broken(),
            TaskError::Messaging(e) => e.is_connection_broken(),
            _ => false,
        }
    }
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;
