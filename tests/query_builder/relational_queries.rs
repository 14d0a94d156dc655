use qtm::database::DatabaseError;
use qtm::query_builder::{number_placeholders, BindValue, Operator, Query, SortDirection};
use serde_json::{json, Value};

#[test]
fn test_queue_style_select() {
    let query = Query::relational("queue")
        .add_select_field("message_id")
        .add_condition("name", "url")
        .add_condition_op("visibility_timeout", Operator::Is, Value::Null)
        .add_sort("message_id", SortDirection::Ascending)
        .set_limit(5);

    assert_eq!(
        query.get_select_query(true),
        "SELECT message_id AS message_id FROM queue WHERE (name) = $1 AND \
         (visibility_timeout) IS NULL ORDER BY message_id ASC LIMIT 5"
    );
    assert_eq!(query.get_bind_params(), vec![BindValue::Text("url".into())]);
}

#[test]
fn test_in_list_keeps_native_types() {
    let query = Query::relational("queue").add_condition_op("message_id", Operator::In, vec![1i64, 2, 3]);

    assert_eq!(
        query.get_select_query(true),
        "SELECT  *  FROM queue WHERE (message_id) IN ($1,$2,$3)"
    );
    assert_eq!(
        query.get_bind_params(),
        vec![BindValue::Int(1), BindValue::Int(2), BindValue::Int(3)]
    );
}

#[test]
fn test_update_and_delete_are_not_implemented() {
    let query = Query::relational("queue").add_condition("name", "url");

    assert!(matches!(
        query.get_update_query("{}"),
        Err(DatabaseError::NotImplemented { .. })
    ));
    assert!(matches!(
        query.get_delete_query(),
        Err(DatabaseError::NotImplemented { .. })
    ));
}

#[test]
fn test_insert_returning_message_id() {
    let mut row = serde_json::Map::new();
    row.insert("message_body".into(), json!("{\"a\":\"it's\"}"));
    row.insert("name".into(), json!("url"));

    let query = Query::relational("queue").set_insert_data(row).returning(&["message_id"]);
    assert_eq!(
        query.get_insert_query(),
        r#"INSERT INTO queue(message_body,name) VALUES ('{"a":"it''s"}','url') RETURNING message_id"#
    );
}

#[test]
fn test_numbering_ignores_text_around_tokens() {
    assert_eq!(number_placeholders("a {?} b {?}{?}"), "a $1 b $2$3");
    assert_eq!(number_placeholders("no tokens"), "no tokens");
}
