//! Task, subtask and message value types.

use crate::constants::task_keys;
use crate::messaging::{MessageReceipt, QueueItem};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Enabled,
    /// Never completes and is never deleted automatically
    Disabled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Enabled => "enabled",
            TaskStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(TaskStatus::Enabled),
            "disabled" => Ok(TaskStatus::Disabled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A group of queued messages completing together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    /// Unix seconds
    pub create_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Absent on tasks stored before time tracking existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<bool>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, status: TaskStatus, callback_url: Option<String>, track: bool) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            create_time: Utc::now().timestamp(),
            callback_url,
            track: Some(track),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == TaskStatus::Enabled
    }

    /// Tasks without a `track` flag are tracked
    pub fn tracks_time(&self) -> bool {
        self.track.unwrap_or(true)
    }

    /// Seconds elapsed since creation
    pub fn execution_time(&self, now: i64) -> i64 {
        now - self.create_time
    }
}

/// One outstanding message of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub task_id: String,
    pub message_id: i64,
}

/// A message as handed to a consumer by [`crate::qtm::Qtm::receive`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub id: Option<i64>,
    pub message: Value,
    /// Transport receipt handle, required for deletion by some transports
    pub handle: Option<String>,
}

impl ReceivedMessage {
    pub fn task_id(&self) -> Option<&str> {
        self.message.get(task_keys::TASK_ID).and_then(Value::as_str)
    }
}

impl From<QueueItem> for ReceivedMessage {
    fn from(item: QueueItem) -> Self {
        let handle = item.receipt_handle().map(str::to_string);
        Self {
            id: item.id,
            message: item.body,
            handle,
        }
    }
}

/// Immutable description of a processed message, passed back to finish or delete it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskMessage {
    id: Option<i64>,
    task_id: Option<String>,
    handle: Option<String>,
    body: Map<String, Value>,
}

impl TaskMessage {
    pub fn new(id: Option<i64>, task_id: Option<String>, handle: Option<String>, body: Map<String, Value>) -> Self {
        Self {
            id,
            task_id,
            handle,
            body,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Body field by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Whether the message can be located on its queue
    pub fn is_identifiable(&self) -> bool {
        self.receipt().is_some()
    }

    /// Receipt handle first, numeric id otherwise
    pub fn receipt(&self) -> Option<MessageReceipt> {
        match (&self.handle, self.id) {
            (Some(handle), _) if !handle.is_empty() => Some(MessageReceipt::Handle(handle.clone())),
            (_, Some(id)) => Some(MessageReceipt::Id(id)),
            _ => None,
        }
    }
}

impl From<&ReceivedMessage> for TaskMessage {
    fn from(received: &ReceivedMessage) -> Self {
        let body = match &received.message {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        Self {
            id: received.id,
            task_id: received.task_id().map(str::to_string),
            handle: received.handle.clone(),
            body,
        }
    }
}
