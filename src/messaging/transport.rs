//! Queue transport contract shared by every message queue implementation.

use super::errors::MessagingResult;
use crate::constants::{defaults, RECEIPT_HANDLE_KEY};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A message as handed out by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: Option<i64>,
    pub body: Value,
    /// Transport specific attributes; a receipt handle lives under `ReceiptHandle`
    pub metadata: Map<String, Value>,
}

impl QueueItem {
    pub fn new(id: i64, body: Value) -> Self {
        Self {
            id: Some(id),
            body,
            metadata: Map::new(),
        }
    }

    pub fn with_receipt_handle(mut self, handle: impl Into<String>) -> Self {
        self.metadata
            .insert(RECEIPT_HANDLE_KEY.to_string(), Value::String(handle.into()));
        self
    }

    pub fn receipt_handle(&self) -> Option<&str> {
        self.metadata.get(RECEIPT_HANDLE_KEY).and_then(Value::as_str)
    }
}

/// Identifies a message to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageReceipt {
    Id(i64),
    Handle(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Seconds before the message becomes visible
    pub delay_seconds: Option<u64>,
}

impl PublishOptions {
    pub fn delayed(delay_seconds: u64) -> Self {
        Self {
            delay_seconds: Some(delay_seconds),
        }
    }
}

/// Per-call receive options; unset values fall back to the queue's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub messages_to_receive: Option<u32>,
    /// Lease length in seconds
    pub message_visibility_timeout: Option<u64>,
    /// Seconds to keep polling while the queue is empty
    pub receive_wait_time: Option<u64>,
}

impl ReceiveOptions {
    pub fn limit(messages_to_receive: u32) -> Self {
        Self {
            messages_to_receive: Some(messages_to_receive),
            ..Self::default()
        }
    }

    pub fn visibility_timeout(mut self, seconds: u64) -> Self {
        self.message_visibility_timeout = Some(seconds);
        self
    }

    pub fn wait_time(mut self, seconds: u64) -> Self {
        self.receive_wait_time = Some(seconds);
        self
    }
}

/// Instance-level queue settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDefaults {
    pub prefix: String,
    pub delay_seconds: u64,
    pub receive_limit: u32,
    pub visibility_timeout_seconds: u64,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delay_seconds: defaults::DELAY_SECONDS,
            receive_limit: defaults::RECEIVE_LIMIT,
            visibility_timeout_seconds: defaults::VISIBILITY_TIMEOUT_SECONDS,
        }
    }
}

impl QueueDefaults {
    /// Physical queue name, `<prefix>_<name>` when a prefix is configured
    pub fn queue_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    pub fn delay(&self, options: &PublishOptions) -> u64 {
        options.delay_seconds.unwrap_or(self.delay_seconds)
    }

    pub fn receive_limit(&self, options: &ReceiveOptions) -> u32 {
        options
            .messages_to_receive
            .filter(|limit| *limit > 0)
            .unwrap_or(self.receive_limit)
    }

    pub fn visibility_timeout(&self, options: &ReceiveOptions) -> u64 {
        options
            .message_visibility_timeout
            .unwrap_or(self.visibility_timeout_seconds)
    }
}

/// Publish, lease, acknowledge and tear down messages on one named queue.
///
/// Delivery is at least once: a received message stays invisible for its
/// visibility timeout and reappears unless deleted.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Physical queue name
    fn name(&self) -> &str;

    /// Enqueue a message, returning its id
    async fn publish(&self, message: &Value, options: &PublishOptions) -> MessagingResult<i64>;

    /// Lease up to the configured number of visible messages
    async fn receive(&self, options: &ReceiveOptions) -> MessagingResult<Vec<QueueItem>>;

    async fn delete(&self, receipt: &MessageReceipt) -> MessagingResult<()>;

    /// Remove every message of the queue, returning how many were removed
    async fn destroy(&self) -> MessagingResult<u64>;
}
