//! Queue Task Manager Worker
//!
//! Long-running process that polls the configured queues and finishes each
//! message's task. Every configured queue gets a `log-<queue>` job that records
//! the message body; `worker.jobs` selects which jobs run (all of them when empty).

use async_trait::async_trait;
use qtm::database::{migrations, DatabaseConnection};
use qtm::logging::{init_structured_logging, Logger, TracingLogger};
use qtm::messaging::{DatabaseQueue, QueueTransport};
use qtm::qtm::{HttpCallbackNotifier, PgTaskStore, Qtm, TaskMessage};
use qtm::worker::{Consumer, ConsumerRegistry, MessageHandler, QueueConsumer, Worker, WorkerSettings};
use qtm::{log_context, QtmConfig};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

struct LogMessageHandler {
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl MessageHandler for LogMessageHandler {
    async fn handle(&self, message: &TaskMessage) -> anyhow::Result<()> {
        self.logger.info(
            "Processing message",
            &log_context! {
                "message_id" => message.id(),
                "task_id" => message.task_id(),
                "body" => message.body(),
            },
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = QtmConfig::load()?;
    init_structured_logging(&config.logging);
    info!("🚀 Starting queue task manager worker");

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let connection = Arc::new(
        DatabaseConnection::connect(&config.database.url, config.database.connect_timeout()).await?,
    );
    migrations::run(&connection).await?;

    let queue_defaults = config.messaging.queue_defaults();
    let notifier = Arc::new(HttpCallbackNotifier::from_config(&config.callback)?);
    let store = Arc::new(PgTaskStore::new(connection.clone(), logger.clone()));

    let mut manager = Qtm::new(store, notifier, logger.clone());
    for queue in &config.messaging.queues {
        let transport: Arc<dyn QueueTransport> = Arc::new(DatabaseQueue::new(
            connection.clone(),
            queue,
            queue_defaults.clone(),
            logger.clone(),
        ));
        manager = manager.with_queue(queue, transport);
    }
    manager.set_task_time_tracking(config.tasks.track_time);
    let manager = Arc::new(manager);

    let mut registry = ConsumerRegistry::new();
    for queue in &config.messaging.queues {
        let job = format!("log-{queue}");
        let name = job.clone();
        let queue = queue.clone();
        let logger = logger.clone();
        registry.register(&name, move |qtm| -> Arc<dyn Consumer> {
            let handler = Arc::new(LogMessageHandler { logger: logger.clone() });
            Arc::new(QueueConsumer::new(&job, &queue, qtm, handler, logger.clone()))
        });
    }

    let jobs = if config.worker.jobs.is_empty() {
        registry.job_names().into_iter().map(String::from).collect()
    } else {
        config.worker.jobs.clone()
    };
    let consumers = registry.resolve_all(&jobs, manager.clone())?;
    info!(jobs = ?jobs, "Consumers resolved");

    let worker = Worker::new(consumers, WorkerSettings::from(&config.worker), logger);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    connection.close().await;
    info!("Worker stopped");

    Ok(())
}
