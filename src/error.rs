//! # Error Types
//!
//! Crate-level error aggregating the storage, messaging and task layers.

use crate::database::DatabaseError;
use crate::messaging::MessagingError;
use crate::qtm::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QtmError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No consumer registered for job: {0}")]
    UnknownJob(String),

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl QtmError {
    /// Connection failures end the current worker cycle instead of being skipped.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            QtmError::Database(e) => e.is_connection_broken(),
            QtmError::Messaging(e) => e.is_connection_broken(),
            QtmError::Task(e) => e.is_connection_broken(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for QtmError {
    fn from(err: config::ConfigError) -> Self {
        QtmError::Configuration(err.to_string())
    }
}

pub type QtmResult<T> = std::result::Result<T, QtmError>;
