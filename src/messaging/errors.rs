//! # Messaging Error Types

use crate::database::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Queue {0} is not defined")]
    QueueNotDefined(String),

    #[error("Message queue does not support operation: {0}")]
    UnsupportedOperation(String),

    #[error("Message could not be published to queue {queue}: {message}")]
    Publish { queue: String, message: String },

    #[error("Message {message_id} could not be updated in queue {queue}")]
    Update { queue: String, message_id: i64 },

    #[error("Message {message} could not be deleted from queue {queue}")]
    Delete { queue: String, message: String },

    #[error("Message serialization error: {0}")]
    MessageSerialization(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl MessagingError {
    pub fn queue_not_defined(queue: impl Into<String>) -> Self {
        Self::QueueNotDefined(queue.into())
    }

    pub fn unsupported_operation(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation(operation.into())
    }

    pub fn publish(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            queue: queue.into(),
            message: message.into(),
        }
    }

    pub fn update(queue: impl Into<String>, message_id: i64) -> Self {
        Self::Update {
            queue: queue.into(),
            message_id,
        }
    }

    /// `message` is the id or receipt handle that failed
    pub fn delete(queue: impl Into<String>, message: impl ToString) -> Self {
        Self::Delete {
            queue: queue.into(),
            message: message.to_string(),
        }
    }

    pub fn is_connection_broken(&self) -> bool {
        matches!(self, MessagingError::Database(e) if e.is_connection_broken())
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::MessageSerialization(err.to_string())
    }
}

pub type MessagingResult<T> = std::result::Result<T, MessagingError>;
