use crate::common::{test_connection, unique_name};
use qtm::logging::RecordingLogger;
use qtm::qtm::{PgTaskStore, Task, TaskError, TaskStatus, TaskStore};
use std::sync::Arc;

async fn store() -> Option<PgTaskStore> {
    let connection = test_connection().await?;
    Some(PgTaskStore::new(connection, Arc::new(RecordingLogger::new())))
}

#[tokio::test]
async fn test_task_round_trip_and_status_update() {
    let Some(store) = store().await else {
        return;
    };
    let task = Task::new(unique_name("task"), TaskStatus::Enabled, Some("http://cb".into()), true);

    store.save_task(&task).await.unwrap();
    assert_eq!(store.find_task(&task.task_id).await.unwrap(), Some(task.clone()));

    store.update_status(&task.task_id, TaskStatus::Disabled).await.unwrap();
    let found = store.find_task(&task.task_id).await.unwrap().unwrap();
    assert_eq!(found.status, TaskStatus::Disabled);
    assert_eq!(found.callback_url.as_deref(), Some("http://cb"));

    store.delete_task(&task.task_id).await.unwrap();
    assert!(store.find_task(&task.task_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_task_id_is_rejected() {
    let Some(store) = store().await else {
        return;
    };
    let task = Task::new(unique_name("dup"), TaskStatus::Enabled, None, true);
    store.save_task(&task).await.unwrap();

    let again = store.save_task(&task).await;
    assert!(matches!(again, Err(TaskError::TaskSave { .. })));

    store.delete_task(&task.task_id).await.unwrap();
}

#[tokio::test]
async fn test_subtask_accounting() {
    let Some(store) = store().await else {
        return;
    };
    let task = Task::new(unique_name("subtasks"), TaskStatus::Enabled, None, true);
    store.save_task(&task).await.unwrap();

    store.add_subtasks(&task.task_id, &[1, 2, 3]).await.unwrap();
    store.add_subtask(&task.task_id, 4).await.unwrap();
    assert_eq!(store.count_subtasks(&task.task_id).await.unwrap(), 4);
    assert!(!store.is_task_complete(&task).await.unwrap());

    for message_id in 1..=4 {
        store.remove_subtask(&task.task_id, message_id).await.unwrap();
    }
    store.remove_subtask(&task.task_id, 4).await.unwrap();
    assert_eq!(store.count_subtasks(&task.task_id).await.unwrap(), 0);
    assert!(store.is_task_complete(&task).await.unwrap());

    let claimed = store.claim_completed_task(&task.task_id).await.unwrap();
    assert_eq!(claimed.map(|t| t.task_id), Some(task.task_id.clone()));
    assert!(store.claim_completed_task(&task.task_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_across_connections_succeeds_once() {
    let (Some(first), Some(second)) = (store().await, store().await) else {
        return;
    };
    let task = Task::new(unique_name("claim"), TaskStatus::Enabled, None, true);
    first.save_task(&task).await.unwrap();

    let (a, b) = tokio::join!(
        first.claim_completed_task(&task.task_id),
        second.claim_completed_task(&task.task_id)
    );
    let claims = [a.unwrap(), b.unwrap()];
    assert_eq!(claims.iter().filter(|c| c.is_some()).count(), 1);
}

#[tokio::test]
async fn test_disabled_task_is_never_claimed() {
    let Some(store) = store().await else {
        return;
    };
    let task = Task::new(unique_name("disabled"), TaskStatus::Disabled, None, true);
    store.save_task(&task).await.unwrap();

    assert!(store.claim_completed_task(&task.task_id).await.unwrap().is_none());
    assert!(store.find_task(&task.task_id).await.unwrap().is_some());

    store.delete_task(&task.task_id).await.unwrap();
}
