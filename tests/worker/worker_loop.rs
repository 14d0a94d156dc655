use crate::common::{in_memory_manager, url_message, CountingNotifier};
use async_trait::async_trait;
use parking_lot::Mutex;
use qtm::database::DatabaseError;
use qtm::logging::{LogLevel, RecordingLogger};
use qtm::messaging::{InMemoryQueue, PublishOptions, QueueDefaults, QueueTransport, ReceiveOptions};
use qtm::qtm::{Qtm, Task, TaskMessage, TaskResult, TaskStatus, TaskStore};
use qtm::worker::{Consumer, ConsumerRegistry, MessageHandler, QueueConsumer, Worker, WorkerSettings};
use qtm::QtmError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Default)]
struct UrlCollector {
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler for UrlCollector {
    async fn handle(&self, message: &TaskMessage) -> anyhow::Result<()> {
        let url = message
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("message without url"))?;
        self.urls.lock().push(url.to_string());
        Ok(())
    }
}

/// Every operation fails as if the database went away
struct BrokenStore;

#[async_trait]
impl TaskStore for BrokenStore {
    async fn save_task(&self, _task: &Task) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn add_subtask(&self, _task_id: &str, _message_id: i64) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn add_subtasks(&self, _task_id: &str, _message_ids: &[i64]) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn remove_subtask(&self, _task_id: &str, _message_id: i64) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn find_task(&self, _task_id: &str) -> TaskResult<Option<Task>> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn count_subtasks(&self, _task_id: &str) -> TaskResult<u64> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn update_status(&self, _task_id: &str, _status: TaskStatus) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn delete_task(&self, _task_id: &str) -> TaskResult<()> {
        Err(DatabaseError::ConnectionBroken.into())
    }
    async fn claim_completed_task(&self, _task_id: &str) -> TaskResult<Option<Task>> {
        Err(DatabaseError::ConnectionBroken.into())
    }
}

fn settings() -> WorkerSettings {
    WorkerSettings {
        sleep: Duration::from_millis(10),
        work_timeout: Duration::from_secs(5),
        receive: ReceiveOptions::limit(10),
    }
}

fn crawl_registry(handler: Arc<UrlCollector>, logger: Arc<RecordingLogger>) -> ConsumerRegistry {
    let mut registry = ConsumerRegistry::new();
    registry.register("crawl", move |qtm| -> Arc<dyn Consumer> {
        Arc::new(QueueConsumer::new("crawl", "url", qtm, handler.clone(), logger.clone()))
    });
    registry
}

#[tokio::test]
async fn test_cycle_processes_and_completes_task() {
    let notifier = Arc::new(CountingNotifier::new());
    let env = in_memory_manager(notifier.clone());
    let handler = Arc::new(UrlCollector::default());

    let task_id = env
        .qtm
        .generate_empty_task(TaskStatus::Enabled, Some("http://cb"))
        .await
        .unwrap();
    for url in ["http://a", "http://b", "http://c"] {
        env.qtm
            .publish("url", url_message(url), None, Some(&task_id), &PublishOptions::default())
            .await
            .unwrap();
    }

    let registry = crawl_registry(handler.clone(), env.logger.clone());
    let consumers = registry.resolve_all(&["crawl".to_string()], env.qtm.clone()).unwrap();
    let worker = Worker::new(consumers, settings(), env.logger.clone());
    let (_tx, rx) = watch::channel(false);

    let report = worker.run_cycle(&rx).await;
    assert_eq!(report.fetched, 3);
    assert_eq!(report.processed, 3);
    assert!(!report.aborted);

    assert_eq!(handler.urls.lock().as_slice(), ["http://a", "http://b", "http://c"]);
    assert_eq!(notifier.count_for(&task_id), 1);
    assert!(env.queue.is_empty());
    let finished_units = env
        .logger
        .entries_at(LogLevel::Info)
        .into_iter()
        .filter(|e| e.message == "** Work unit - finished")
        .count();
    assert_eq!(finished_units, 3);
}

#[tokio::test]
async fn test_unknown_job_is_a_startup_error() {
    let env = in_memory_manager(Arc::new(CountingNotifier::new()));
    let registry = crawl_registry(Arc::new(UrlCollector::default()), env.logger.clone());

    let result = registry.resolve_all(&["crawl".to_string(), "index".to_string()], env.qtm.clone());
    assert!(matches!(result, Err(QtmError::UnknownJob(ref job)) if job == "index"));
}

#[tokio::test]
async fn test_broken_store_aborts_cycle_with_critical_log() {
    let logger = Arc::new(RecordingLogger::new());
    let queue = Arc::new(InMemoryQueue::new("url", QueueDefaults::default()));
    queue
        .publish(&serde_json::json!({"url": "http://a", "task_id": "t1"}), &PublishOptions::default())
        .await
        .unwrap();

    let qtm = Arc::new(
        Qtm::new(Arc::new(BrokenStore), Arc::new(CountingNotifier::new()), logger.clone())
            .with_queue("url", queue.clone()),
    );
    let handler = Arc::new(UrlCollector::default());
    let consumers = crawl_registry(handler.clone(), logger.clone())
        .resolve_all(&["crawl".to_string()], qtm)
        .unwrap();
    let worker = Worker::new(consumers, settings(), logger.clone());
    let (_tx, rx) = watch::channel(false);

    let report = worker.run_cycle(&rx).await;
    assert!(report.aborted);
    assert!(handler.urls.lock().is_empty());
    assert!(logger.contains(LogLevel::Critical, "Database connection broken"));
}

#[tokio::test]
async fn test_handler_failure_still_finishes_message() {
    let notifier = Arc::new(CountingNotifier::new());
    let env = in_memory_manager(notifier.clone());
    let (_, task_id) = env
        .qtm
        .publish("url", serde_json::Map::new(), Some("http://cb"), None, &PublishOptions::default())
        .await
        .unwrap();

    let consumers = crawl_registry(Arc::new(UrlCollector::default()), env.logger.clone())
        .resolve_all(&["crawl".to_string()], env.qtm.clone())
        .unwrap();
    let worker = Worker::new(consumers, settings(), env.logger.clone());
    let (_tx, rx) = watch::channel(false);

    let report = worker.run_cycle(&rx).await;
    assert_eq!(report.failed, 1);
    assert!(env.logger.contains(LogLevel::Error, "Work unit failed"));
    assert_eq!(notifier.count_for(&task_id), 1);
    assert!(env.queue.is_empty());
}

#[tokio::test]
async fn test_worker_drains_queue_then_stops_on_shutdown() {
    let env = in_memory_manager(Arc::new(CountingNotifier::new()));
    let handler = Arc::new(UrlCollector::default());
    for i in 0..25 {
        env.qtm
            .publish("url", url_message(&format!("http://site/{i}")), None, None, &PublishOptions::default())
            .await
            .unwrap();
    }

    let consumers = crawl_registry(handler.clone(), env.logger.clone())
        .resolve_all(&["crawl".to_string()], env.qtm.clone())
        .unwrap();
    let worker = Worker::new(consumers, settings(), env.logger.clone());
    let (tx, rx) = watch::channel(false);
    let running = tokio::spawn(async move { worker.run(rx).await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !env.queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), running).await.unwrap().unwrap();

    assert_eq!(handler.urls.lock().len(), 25);
    assert_eq!(env.store.task_count(), 0);
}

