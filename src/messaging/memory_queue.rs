//! In-process queue with the same lease semantics as the database queue.
//!
//! Receives are atomic under one lock, so concurrent receivers never share a
//! message. Optionally hands out receipt handles and requires them for deletion,
//! the way hosted queue services do.

use super::errors::{MessagingError, MessagingResult};
use super::transport::{
    MessageReceipt, PublishOptions, QueueDefaults, QueueItem, QueueTransport, ReceiveOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredMessage {
    body: Value,
    visible_at: Option<DateTime<Utc>>,
    handle: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: i64,
    messages: BTreeMap<i64, StoredMessage>,
}

#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    defaults: QueueDefaults,
    receipt_handles: bool,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new(name: &str, defaults: QueueDefaults) -> Self {
        Self {
            name: defaults.queue_name(name),
            defaults,
            receipt_handles: false,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Issue a fresh receipt handle per receive and delete only by handle
    pub fn with_receipt_handles(mut self) -> Self {
        self.receipt_handles = true;
        self
    }

    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages a receive would return right now
    pub fn visible_count(&self) -> usize {
        let now = Utc::now();
        self.state
            .lock()
            .messages
            .values()
            .filter(|m| is_visible(m, now))
            .count()
    }

    /// Lease expiry of a message, `None` when it is visible or unknown
    pub fn visibility_timeout(&self, message_id: i64) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .messages
            .get(&message_id)
            .and_then(|m| m.visible_at)
    }

    /// Make every leased message visible again
    pub fn expire_leases(&self) {
        for message in self.state.lock().messages.values_mut() {
            message.visible_at = None;
        }
    }
}

fn is_visible(message: &StoredMessage, now: DateTime<Utc>) -> bool {
    message.visible_at.map_or(true, |at| at <= now)
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, message: &Value, options: &PublishOptions) -> MessagingResult<i64> {
        let delay = self.defaults.delay(options);
        let visible_at = (delay > 0).then(|| Utc::now() + ChronoDuration::seconds(delay as i64));

        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.messages.insert(
            id,
            StoredMessage {
                body: message.clone(),
                visible_at,
                handle: None,
            },
        );
        Ok(id)
    }

    async fn receive(&self, options: &ReceiveOptions) -> MessagingResult<Vec<QueueItem>> {
        let limit = self.defaults.receive_limit(options) as usize;
        let now = Utc::now();
        let lease_until = now + ChronoDuration::seconds(self.defaults.visibility_timeout(options) as i64);

        let mut state = self.state.lock();
        let mut items = Vec::new();
        for (id, message) in state.messages.iter_mut() {
            if items.len() == limit {
                break;
            }
            if !is_visible(message, now) {
                continue;
            }

            message.visible_at = Some(lease_until);
            let mut item = QueueItem::new(*id, message.body.clone());
            if self.receipt_handles {
                let handle = Uuid::new_v4().to_string();
                message.handle = Some(handle.clone());
                item = item.with_receipt_handle(handle);
            }
            items.push(item);
        }
        Ok(items)
    }

    async fn delete(&self, receipt: &MessageReceipt) -> MessagingResult<()> {
        let mut state = self.state.lock();
        let id = match receipt {
            MessageReceipt::Id(id) if !self.receipt_handles => *id,
            MessageReceipt::Id(id) => return Err(MessagingError::delete(&self.name, *id)),
            MessageReceipt::Handle(handle) => state
                .messages
                .iter()
                .find(|(_, m)| m.handle.as_deref() == Some(handle.as_str()))
                .map(|(id, _)| *id)
                .ok_or_else(|| MessagingError::delete(&self.name, handle))?,
        };

        state
            .messages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MessagingError::delete(&self.name, id))
    }

    async fn destroy(&self) -> MessagingResult<u64> {
        let mut state = self.state.lock();
        let removed = state.messages.len() as u64;
        state.messages.clear();
        Ok(removed)
    }
}
