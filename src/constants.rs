//! # System Constants
//!
//! Table names, document keys and defaults shared by the storage, queue and
//! task layers.

/// Name of the JSONB column that holds documents in document-mode tables
pub const JSONB_FIELD_NAME: &str = "data";

/// Intermediate placeholder token emitted by the query renderers
pub const PLACEHOLDER: &str = "{?}";

pub mod tables {
    pub const TASKS: &str = "tasks";
    pub const SUB_TASKS: &str = "sub_tasks";
    pub const QUEUE: &str = "queue";
}

/// Keys of task and subtask documents
pub mod task_keys {
    pub const TASK_ID: &str = "task_id";
    pub const STATUS: &str = "status";
    pub const CREATE_TIME: &str = "create_time";
    pub const CALLBACK_URL: &str = "callback_url";
    pub const TRACK: &str = "track";
    pub const MESSAGE_ID: &str = "message_id";
    pub const SUBTASK_COUNT: &str = "subtask_count";
}

/// Columns of the relational queue table
pub mod queue_columns {
    pub const NAME: &str = "name";
    pub const MESSAGE_ID: &str = "message_id";
    pub const MESSAGE_BODY: &str = "message_body";
    pub const VISIBILITY_TIMEOUT: &str = "visibility_timeout";
}

/// Metadata key under which transports surface a receipt handle
pub const RECEIPT_HANDLE_KEY: &str = "ReceiptHandle";

/// Queues the manager knows about when none are configured
pub const DEFAULT_QUEUES: &[&str] = &["url"];

pub mod defaults {
    pub const DELAY_SECONDS: u64 = 0;
    pub const RECEIVE_LIMIT: u32 = 10;
    pub const VISIBILITY_TIMEOUT_SECONDS: u64 = 30;
    pub const WORKER_SLEEP_SECONDS: u64 = 5;
    pub const WORK_TIMEOUT_SECONDS: u64 = 30;
    pub const CALLBACK_TIMEOUT_MS: u64 = 10_000;
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 10;
}

/// Log context keys used by the task manager and worker
pub mod log_keys {
    pub const TASK_ID: &str = "task_id";
    pub const PROCESS: &str = "process";
    pub const ACTION: &str = "action";
    pub const EXECUTION_TIME: &str = "execution_time";
    pub const QUEUE: &str = "queue";
    pub const MESSAGE_ID: &str = "message_id";
}
