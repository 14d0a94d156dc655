//! # Worker
//!
//! Background processing for queued messages. Jobs are registered by name in a
//! [`ConsumerRegistry`]; the [`Worker`] resolves the configured jobs and polls each
//! consumer in turn, running every unit of work under a time limit and stopping
//! a cycle early when the database connection breaks.

pub mod consumer;
pub mod registry;
pub mod runner;

pub use consumer::{Consumer, MessageHandler, QueueConsumer};
pub use registry::{ConsumerFactory, ConsumerRegistry};
pub use runner::{CycleReport, Worker, WorkerSettings};
