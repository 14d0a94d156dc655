//! # Queue Task Manager
//!
//! Groups published messages into tasks, tracks one subtask per outstanding
//! message and completes the task when its last message is finished.
//!
//! Publishing and subtask bookkeeping are separate statements: a failure between
//! them leaves a task without subtasks, which is logged and never completes.

use super::callback::CallbackNotifier;
use super::errors::{TaskError, TaskResult};
use super::task::{ReceivedMessage, Task, TaskMessage, TaskStatus};
use super::task_store::TaskStore;
use crate::constants::{log_keys, task_keys};
use crate::log_context;
use crate::logging::Logger;
use crate::messaging::{
    MessageReceipt, MessagingError, PublishOptions, QueueTransport, ReceiveOptions,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const PROCESS_NAME: &str = "QTM";
const FINISH_ACTION: &str = "finishTask";

pub struct Qtm {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn CallbackNotifier>,
    logger: Arc<dyn Logger>,
    queues: HashMap<String, Arc<dyn QueueTransport>>,
    track_task_time: AtomicBool,
}

impl Qtm {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn CallbackNotifier>, logger: Arc<dyn Logger>) -> Self {
        Self {
            store,
            notifier,
            logger,
            queues: HashMap::new(),
            track_task_time: AtomicBool::new(true),
        }
    }

    /// Register a transport under a logical queue name
    pub fn with_queue(mut self, name: &str, queue: Arc<dyn QueueTransport>) -> Self {
        self.queues.insert(name.to_string(), queue);
        self
    }

    pub fn queue_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queues.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn queue(&self, name: &str) -> TaskResult<&Arc<dyn QueueTransport>> {
        self.queues
            .get(name)
            .ok_or_else(|| MessagingError::queue_not_defined(name).into())
    }

    /// Whether tasks created by [`publish`](Self::publish) log their execution time
    pub fn set_task_time_tracking(&self, enabled: bool) {
        self.track_task_time.store(enabled, Ordering::Relaxed);
    }

    pub fn task_time_tracking(&self) -> bool {
        self.track_task_time.load(Ordering::Relaxed)
    }

    /// Publish a message as part of a task, returning `(message_id, task_id)`.
    ///
    /// The task is taken from `task_id`, then from the message's `task_id` field;
    /// without either a new enabled task is created.
    pub async fn publish(
        &self,
        queue: &str,
        mut message: Map<String, Value>,
        callback_url: Option<&str>,
        task_id: Option<&str>,
        options: &PublishOptions,
    ) -> TaskResult<(i64, String)> {
        let transport = self.queue(queue)?;

        let existing = task_id.map(str::to_string).or_else(|| {
            message
                .get(task_keys::TASK_ID)
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        let task_id = match existing {
            Some(task_id) => task_id,
            None => {
                let task = Task::new(
                    Uuid::new_v4().to_string(),
                    TaskStatus::Enabled,
                    callback_url.map(str::to_string),
                    self.task_time_tracking(),
                );
                self.store.save_task(&task).await?;
                task.task_id
            }
        };

        self.logger.debug(
            "Publishing message to the queue",
            &log_context! {
                log_keys::QUEUE => queue,
                "message" => message,
                log_keys::TASK_ID => task_id,
                task_keys::CALLBACK_URL => callback_url,
            },
        );

        message.insert(task_keys::TASK_ID.to_string(), Value::String(task_id.clone()));
        let message_id = transport.publish(&Value::Object(message), options).await?;

        if let Err(e) = self.store.add_subtask(&task_id, message_id).await {
            self.logger.error(
                "Message published but its subtask could not be recorded",
                &log_context! {
                    log_keys::TASK_ID => task_id,
                    log_keys::MESSAGE_ID => message_id,
                    "error" => e.to_string(),
                },
            );
            return Err(e);
        }

        Ok((message_id, task_id))
    }

    /// Acknowledge a processed message and complete its task when it was the last one.
    ///
    /// Returns the task when this call completed it. A message already gone from
    /// the queue is not an error.
    pub async fn finish(&self, queue: &str, message: &TaskMessage) -> TaskResult<Option<Task>> {
        self.logger.debug(
            "Finished processing message.",
            &log_context! {
                log_keys::QUEUE => queue,
                log_keys::MESSAGE_ID => message.id(),
                log_keys::TASK_ID => message.task_id(),
            },
        );

        let transport = self.queue(queue)?;
        let receipt = receipt_of(message)?;

        match &receipt {
            MessageReceipt::Handle(handle) => self.logger.info(
                &format!("Removing message with handle: {handle}"),
                &log_context! { log_keys::QUEUE => queue },
            ),
            MessageReceipt::Id(id) => self.logger.info(
                &format!("Removing message with id: {id}"),
                &log_context! { log_keys::QUEUE => queue },
            ),
        }

        match transport.delete(&receipt).await {
            Ok(()) => {}
            Err(e @ MessagingError::Delete { .. }) => self.logger.warning(
                "Message was already removed from the queue",
                &log_context! { log_keys::QUEUE => queue, "error" => e.to_string() },
            ),
            Err(e) => return Err(e.into()),
        }

        let Some(task_id) = message.task_id() else {
            return Ok(None);
        };

        match message.id() {
            Some(message_id) => self.store.remove_subtask(task_id, message_id).await?,
            None => self.logger.warning(
                "Message without id cannot release its subtask",
                &log_context! { log_keys::TASK_ID => task_id },
            ),
        }

        let Some(task) = self.store.claim_completed_task(task_id).await? else {
            return Ok(None);
        };

        self.logger
            .debug("Task finished", &log_context! { log_keys::TASK_ID => task.task_id });

        if let Some(url) = &task.callback_url {
            self.call_callback_url(&task, url).await;
        }

        if task.tracks_time() {
            self.log_execution_time(&task);
        }

        Ok(Some(task))
    }

    /// Remove a message from its queue without touching task bookkeeping
    pub async fn delete_message(&self, queue: &str, message: &TaskMessage) -> TaskResult<()> {
        let transport = self.queue(queue)?;
        let receipt = receipt_of(message)?;
        transport.delete(&receipt).await?;
        Ok(())
    }

    pub async fn receive(&self, queue: &str, options: &ReceiveOptions) -> TaskResult<Vec<ReceivedMessage>> {
        let transport = self.queue(queue)?;
        let items = transport.receive(options).await?;
        Ok(items.into_iter().map(ReceivedMessage::from).collect())
    }

    /// `None` when the task does not exist
    pub async fn get_task_status(&self, task_id: &str) -> TaskResult<Option<TaskStatus>> {
        Ok(self.store.find_task(task_id).await?.map(|task| task.status))
    }

    pub async fn find_task(&self, task_id: &str) -> TaskResult<Option<Task>> {
        self.store.find_task(task_id).await
    }

    /// Create a task without messages, returning its id
    pub async fn generate_empty_task(&self, status: TaskStatus, callback_url: Option<&str>) -> TaskResult<String> {
        let task = Task::new(
            Uuid::new_v4().to_string(),
            status,
            callback_url.map(str::to_string),
            true,
        );
        self.store.save_task(&task).await?;
        Ok(task.task_id)
    }

    pub async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> TaskResult<()> {
        self.store.update_status(task_id, status).await
    }

    /// Attach already published messages to a task
    pub async fn add_subtasks(&self, task_id: &str, message_ids: &[i64]) -> TaskResult<()> {
        self.store.add_subtasks(task_id, message_ids).await
    }

    pub async fn delete_task(&self, task_id: &str) -> TaskResult<()> {
        self.store.delete_task(task_id).await
    }

    async fn call_callback_url(&self, task: &Task, url: &str) {
        self.logger.debug(
            &format!("Calling the task callback_url for: {}", task.task_id),
            &log_context! { log_keys::TASK_ID => task.task_id, task_keys::CALLBACK_URL => url },
        );

        if let Err(e) = self.notifier.notify(task, url).await {
            self.logger.error(
                &e.to_string(),
                &log_context! { log_keys::TASK_ID => task.task_id, task_keys::CALLBACK_URL => url },
            );
        }
    }

    fn log_execution_time(&self, task: &Task) {
        self.logger.info(
            "** Task - finished",
            &log_context! {
                log_keys::PROCESS => PROCESS_NAME,
                log_keys::ACTION => FINISH_ACTION,
                log_keys::TASK_ID => task.task_id,
                log_keys::EXECUTION_TIME => task.execution_time(Utc::now().timestamp()),
            },
        );
    }
}

fn receipt_of(message: &TaskMessage) -> TaskResult<MessageReceipt> {
    message.receipt().ok_or_else(|| {
        TaskError::MessageNotFound(format!(
            "message of task {} has neither an id nor a receipt handle",
            message.task_id().unwrap_or("<none>")
        ))
    })
}
