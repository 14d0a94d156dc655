//! Consumers turn queued messages into units of work.

use crate::constants::log_keys;
use crate::error::{QtmError, QtmResult};
use crate::log_context;
use crate::logging::Logger;
use crate::messaging::ReceiveOptions;
use crate::qtm::{Qtm, ReceivedMessage, TaskMessage, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;

/// A job the worker polls for work and runs unit by unit
#[async_trait]
pub trait Consumer: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_work(&self, options: &ReceiveOptions) -> QtmResult<Vec<TaskMessage>>;

    async fn run(&self, message: TaskMessage) -> QtmResult<()>;
}

/// Application logic applied to one message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &TaskMessage) -> anyhow::Result<()>;
}

/// [`Consumer`] reading one queue through the task manager.
///
/// Messages whose task is missing or disabled are dropped from the queue without
/// touching task bookkeeping. Every processed message is finished, whether the
/// handler succeeded or not.
pub struct QueueConsumer {
    name: String,
    queue: String,
    qtm: Arc<Qtm>,
    handler: Arc<dyn MessageHandler>,
    logger: Arc<dyn Logger>,
}

impl QueueConsumer {
    pub fn new(
        name: &str,
        queue: &str,
        qtm: Arc<Qtm>,
        handler: Arc<dyn MessageHandler>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            name: name.to_string(),
            queue: queue.to_string(),
            qtm,
            handler,
            logger,
        }
    }

    /// Messages without a task are always valid
    async fn has_valid_task(&self, task_id: Option<&str>) -> QtmResult<bool> {
        let Some(task_id) = task_id else {
            return Ok(true);
        };

        match self.qtm.get_task_status(task_id).await? {
            Some(TaskStatus::Enabled) => Ok(true),
            Some(TaskStatus::Disabled) => {
                self.logger.info(
                    &format!("Skipping message for disabled task id: {task_id}"),
                    &log_context! { log_keys::TASK_ID => task_id },
                );
                Ok(false)
            }
            None => {
                self.logger.error(
                    &format!("Found message with invalid task id: {task_id}"),
                    &log_context! { log_keys::TASK_ID => task_id },
                );
                Ok(false)
            }
        }
    }

    /// Whether the message is work; drops it from the queue when its task is gone
    async fn screen(&self, item: &ReceivedMessage, message: &TaskMessage) -> QtmResult<bool> {
        if self.has_valid_task(message.task_id()).await? {
            return Ok(true);
        }

        self.logger.warning(
            "Delete message when no task is present.",
            &log_context! { log_keys::QUEUE => self.queue, "message" => item.message },
        );
        self.qtm.delete_message(&self.queue, message).await?;
        Ok(false)
    }
}

#[async_trait]
impl Consumer for QueueConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_work(&self, options: &ReceiveOptions) -> QtmResult<Vec<TaskMessage>> {
        let received = self.qtm.receive(&self.queue, options).await?;

        let mut work = Vec::with_capacity(received.len());
        for item in &received {
            let message = TaskMessage::from(item);
            match self.screen(item, &message).await {
                Ok(true) => work.push(message),
                Ok(false) => {}
                Err(e) if e.is_connection_broken() => return Err(e),
                // The message stays leased and reappears once its visibility timeout lapses
                Err(e) => self.logger.error(
                    "Failed to check message task, skipping message",
                    &log_context! {
                        log_keys::QUEUE => self.queue,
                        log_keys::MESSAGE_ID => message.id(),
                        "error" => e.to_string(),
                    },
                ),
            }
        }
        Ok(work)
    }

    async fn run(&self, message: TaskMessage) -> QtmResult<()> {
        let handled = self.handler.handle(&message).await;

        if message.is_identifiable() {
            // Spawned so that cancelling this unit cannot interrupt a started finish
            let qtm = self.qtm.clone();
            let queue = self.queue.clone();
            let finishing = message.clone();
            tokio::spawn(async move { qtm.finish(&queue, &finishing).await })
                .await
                .map_err(|e| QtmError::Handler(anyhow::anyhow!("finish task aborted: {e}")))??;
        }

        handled.map_err(QtmError::Handler)
    }
}
