use crate::common::{test_connection, unique_name};
use chrono::{DateTime, Duration, Utc};
use qtm::database::{Dao, DatabaseConnection};
use qtm::logging::RecordingLogger;
use qtm::messaging::{
    DatabaseQueue, MessageReceipt, MessagingError, PublishOptions, QueueDefaults, QueueTransport, ReceiveOptions,
};
use qtm::query_builder::BindValue;
use serde_json::json;
use std::sync::Arc;

fn database_queue(connection: Arc<DatabaseConnection>, name: &str) -> DatabaseQueue {
    DatabaseQueue::new(connection, name, QueueDefaults::default(), Arc::new(RecordingLogger::new()))
}

async fn lease_of(connection: Arc<DatabaseConnection>, message_id: i64) -> Option<DateTime<Utc>> {
    let rows = Dao::new(connection, "queue")
        .fetch_rows(
            "SELECT visibility_timeout FROM queue WHERE message_id = $1",
            &[BindValue::Int(message_id)],
        )
        .await
        .unwrap();
    rows[0]["visibility_timeout"]
        .as_str()
        .map(|text| DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc))
}

#[tokio::test]
async fn test_publish_receive_delete_round() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let queue = DatabaseQueue::new(
        connection,
        &unique_name("url"),
        QueueDefaults::default(),
        Arc::new(RecordingLogger::new()),
    );

    let first = queue
        .publish(&json!({"url": "http://a", "task_id": "t1"}), &PublishOptions::default())
        .await
        .unwrap();
    let second = queue
        .publish(&json!({"url": "http://b"}), &PublishOptions::default())
        .await
        .unwrap();
    assert!(second > first);

    let items = queue.receive(&ReceiveOptions::limit(1)).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, Some(first));
    assert_eq!(items[0].body, json!({"url": "http://a", "task_id": "t1"}));

    let rest = queue.receive(&ReceiveOptions::default()).await.unwrap();
    assert_eq!(rest.iter().filter_map(|i| i.id).collect::<Vec<_>>(), vec![second]);
    assert!(queue.receive(&ReceiveOptions::default()).await.unwrap().is_empty());

    queue.delete(&MessageReceipt::Id(first)).await.unwrap();
    let again = queue.delete(&MessageReceipt::Id(first)).await;
    assert!(matches!(again, Err(MessagingError::Delete { .. })));

    assert_eq!(queue.destroy().await.unwrap(), 1);
}

#[tokio::test]
async fn test_delayed_message_stays_hidden() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let queue = DatabaseQueue::new(
        connection,
        &unique_name("delayed"),
        QueueDefaults::default(),
        Arc::new(RecordingLogger::new()),
    );

    queue
        .publish(&json!({"url": "http://later"}), &PublishOptions::delayed(120))
        .await
        .unwrap();
    assert!(queue.receive(&ReceiveOptions::default()).await.unwrap().is_empty());
    assert_eq!(queue.destroy().await.unwrap(), 1);
}

#[tokio::test]
async fn test_zero_visibility_timeout_releases_immediately() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let queue = DatabaseQueue::new(
        connection,
        &unique_name("lease"),
        QueueDefaults::default(),
        Arc::new(RecordingLogger::new()),
    );
    let id = queue
        .publish(&json!({"url": "http://a"}), &PublishOptions::default())
        .await
        .unwrap();

    let options = ReceiveOptions::limit(1).visibility_timeout(0);
    assert_eq!(queue.receive(&options).await.unwrap()[0].id, Some(id));
    assert_eq!(queue.receive(&options).await.unwrap()[0].id, Some(id));

    queue.destroy().await.unwrap();
}

#[tokio::test]
async fn test_delete_by_handle_is_unsupported() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let queue = DatabaseQueue::new(
        connection,
        &unique_name("handles"),
        QueueDefaults::default(),
        Arc::new(RecordingLogger::new()),
    );

    let result = queue.delete(&MessageReceipt::Handle("abc".into())).await;
    assert!(matches!(result, Err(MessagingError::UnsupportedOperation(_))));
}

#[tokio::test]
async fn test_receive_leases_for_visibility_timeout() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let queue = database_queue(connection.clone(), &unique_name("lease_window"));
    let id = queue
        .publish(&json!({"url": "http://a"}), &PublishOptions::default())
        .await
        .unwrap();
    assert_eq!(lease_of(connection.clone(), id).await, None);

    let before = Utc::now();
    let items = queue.receive(&ReceiveOptions::limit(1).visibility_timeout(45)).await.unwrap();
    let after = Utc::now();
    assert_eq!(items[0].id, Some(id));

    let lease = lease_of(connection.clone(), id).await.unwrap();
    assert!(lease >= before + Duration::seconds(45) - Duration::milliseconds(1));
    assert!(lease <= after + Duration::seconds(45));

    queue.destroy().await.unwrap();
}

#[tokio::test]
async fn test_locked_row_is_skipped_not_waited_for() {
    let (Some(first), Some(second)) = (test_connection().await, test_connection().await) else {
        return;
    };
    let name = unique_name("contended");
    let queue = database_queue(first, &name);
    let id = queue
        .publish(&json!({"url": "http://a"}), &PublishOptions::default())
        .await
        .unwrap();

    let holder = Dao::new(second, "queue");
    let mut tx = holder.begin_transaction().await.unwrap();
    tx.fetch_rows(
        "SELECT message_id FROM queue WHERE name = $1 FOR UPDATE",
        &[BindValue::Text(name.clone())],
    )
    .await
    .unwrap();

    assert!(queue.receive(&ReceiveOptions::limit(1)).await.unwrap().is_empty());

    tx.rollback().await.unwrap();
    let items = queue.receive(&ReceiveOptions::limit(1)).await.unwrap();
    assert_eq!(items[0].id, Some(id));

    queue.destroy().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_receivers_share_one_row_once() {
    let (Some(first), Some(second)) = (test_connection().await, test_connection().await) else {
        return;
    };
    let name = unique_name("race");
    let left = database_queue(first, &name);
    let right = database_queue(second, &name);
    left.publish(&json!({"url": "http://a"}), &PublishOptions::default())
        .await
        .unwrap();

    let options = ReceiveOptions::limit(1);
    let (a, b) = tokio::join!(left.receive(&options), right.receive(&options));
    assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);

    left.destroy().await.unwrap();
}
