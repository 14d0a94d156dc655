//! # Messaging Module
//!
//! Queue transports the task manager publishes to and workers receive from.
//!
//! - [`DatabaseQueue`] - rows in the relational `queue` table, leased with
//!   `FOR UPDATE NOWAIT` and a visibility timeout
//! - [`InMemoryQueue`] - the same contract inside one process

pub mod database_queue;
pub mod errors;
pub mod memory_queue;
pub mod transport;

pub use database_queue::DatabaseQueue;
pub use errors::{MessagingError, MessagingResult};
pub use memory_queue::InMemoryQueue;
pub use transport::{
    MessageReceipt, PublishOptions, QueueDefaults, QueueItem, QueueTransport, ReceiveOptions,
};
