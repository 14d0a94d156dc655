//! Task manager fixtures over in-memory transports and storage.

use qtm::logging::RecordingLogger;
use qtm::messaging::{InMemoryQueue, QueueDefaults};
use qtm::qtm::{CallbackNotifier, InMemoryTaskStore, Qtm};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct TestManager {
    pub qtm: Arc<Qtm>,
    pub store: Arc<InMemoryTaskStore>,
    pub queue: Arc<InMemoryQueue>,
    pub logger: Arc<RecordingLogger>,
}

/// A manager with a single `url` queue
pub fn in_memory_manager(notifier: Arc<dyn CallbackNotifier>) -> TestManager {
    build_manager(InMemoryQueue::new("url", QueueDefaults::default()), notifier)
}

/// Same as [`in_memory_manager`] but the queue deletes by receipt handle only
pub fn handle_based_manager(notifier: Arc<dyn CallbackNotifier>) -> TestManager {
    build_manager(
        InMemoryQueue::new("url", QueueDefaults::default()).with_receipt_handles(),
        notifier,
    )
}

fn build_manager(queue: InMemoryQueue, notifier: Arc<dyn CallbackNotifier>) -> TestManager {
    let logger = Arc::new(RecordingLogger::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let queue = Arc::new(queue);
    let qtm = Arc::new(
        Qtm::new(store.clone(), notifier, logger.clone()).with_queue("url", queue.clone()),
    );

    TestManager {
        qtm,
        store,
        queue,
        logger,
    }
}

pub fn url_message(url: &str) -> Map<String, Value> {
    let mut message = Map::new();
    message.insert("url".to_string(), json!(url));
    message
}
