use crate::common::{test_connection, unique_name};
use qtm::database::{Dao, DatabaseError};
use qtm::query_builder::{BindValue, FieldType, Query, SelectField};
use serde_json::{json, Map, Value};

fn document(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_insert_select_update_remove() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let dao = Dao::new(connection, "tasks");
    let task_id = unique_name("doc");

    let inserted = dao
        .insert(&Query::document("tasks").set_insert_data(document(json!({
            "task_id": task_id,
            "status": "enabled",
            "meta": {"owner": {"id": "u1"}, "tags": ["a", "b"]},
        }))))
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let selected = dao
        .find_one(
            &Query::document("tasks")
                .add_select_field_object(SelectField::new("meta.owner.id").alias("owner_id"))
                .add_select_field_object(SelectField::new("meta.tags").alias("tags").field_type(FieldType::Array))
                .add_condition("task_id", task_id.as_str()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(selected, json!({"owner_id": "u1", "tags": ["a", "b"]}));

    let updated = dao
        .update(
            &Query::document("tasks")
                .add_condition("task_id", task_id.as_str())
                .add_update_data("status", "disabled")
                .add_update_data("meta.owner.name", "Ada"),
        )
        .await
        .unwrap();
    assert!(updated);

    let stored = dao
        .find_one(&Query::document("tasks").add_condition("task_id", task_id.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["status"], "disabled");
    assert_eq!(stored["meta"]["owner"], json!({"id": "u1", "name": "Ada"}));

    let removed = dao
        .remove(&Query::document("tasks").add_condition("task_id", task_id.as_str()))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!dao
        .update(&Query::document("tasks").add_condition("task_id", task_id.as_str()).add_update_data("status", "x"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_write_back_over_changed_row_reports_failure() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let dao = Dao::new(connection, "tasks");
    let task_id = unique_name("stale");
    let by_id = Query::document("tasks").add_condition("task_id", task_id.as_str());

    dao.insert(&Query::document("tasks").set_insert_data(document(json!({
        "task_id": task_id,
        "status": "enabled",
    }))))
    .await
    .unwrap();
    let stale = dao.find_one(&by_id).await.unwrap().unwrap();

    assert!(dao.update(&by_id.clone().add_update_data("status", "disabled")).await.unwrap());
    assert!(!dao
        .write_back(&by_id.clone().add_update_data("status", "enabled"), stale)
        .await
        .unwrap());

    let stored = dao.find_one(&by_id).await.unwrap().unwrap();
    assert_eq!(stored["status"], "disabled");
}

#[tokio::test]
async fn test_update_keeps_placeholder_text_in_document() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let dao = Dao::new(connection, "tasks");
    let task_id = unique_name("literal");
    let by_id = Query::document("tasks").add_condition("task_id", task_id.as_str());

    dao.insert(&Query::document("tasks").set_insert_data(document(json!({
        "task_id": task_id,
        "status": "enabled",
        "callback_url": "http://hooks.local/{?}",
    }))))
    .await
    .unwrap();

    assert!(dao.update(&by_id.clone().add_update_data("status", "disabled")).await.unwrap());
    let stored = dao.find_one(&by_id).await.unwrap().unwrap();
    assert_eq!(stored["status"], "disabled");
    assert_eq!(stored["callback_url"], "http://hooks.local/{?}");
}

#[tokio::test]
async fn test_dropped_transaction_is_rolled_back() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let dao = Dao::new(connection, "tasks");
    let task_id = unique_name("tx");
    let insert = Query::document("tasks").set_insert_data(document(json!({"task_id": task_id})));

    {
        let mut tx = dao.begin_transaction().await.unwrap();
        tx.execute(&insert.get_insert_query(), &[]).await.unwrap();
    }

    let found = dao
        .find(&Query::document("tasks").add_condition("task_id", task_id.as_str()))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_failed_statement_is_recorded() {
    let Some(connection) = test_connection().await else {
        return;
    };
    let dao = Dao::new(connection, "tasks");

    let result = dao.fetch_rows("SELECT * FROM no_such_table WHERE 1 = $1", &[BindValue::Int(1)]).await;
    assert!(matches!(result, Err(DatabaseError::Statement { .. })));
    assert!(dao.last_error_message().unwrap().contains("no_such_table"));
}

#[tokio::test]
async fn test_closed_connection_reports_broken() {
    let Some(connection) = test_connection().await else {
        return;
    };
    assert!(connection.health_check().await.unwrap());

    connection.close().await;
    let dao = Dao::new(connection, "tasks");
    let result = dao.find(&Query::document("tasks").set_limit(1)).await;
    assert!(matches!(result, Err(ref e) if e.is_connection_broken()));
}
