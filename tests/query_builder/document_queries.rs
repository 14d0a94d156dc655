use qtm::query_builder::{
    BindValue, FieldFunction, Operator, Query, SelectField, SortDirection, WhereField,
};
use serde_json::Value;

#[test]
fn test_or_group_with_sort_and_pagination() {
    let query = Query::document("tasks")
        .add_condition("status", "enabled")
        .add_condition_or(vec![
            WhereField::eq("callback_url", "http://a"),
            WhereField::new("track", Operator::Is, Value::Null),
        ])
        .add_sort("create_time", SortDirection::Descending)
        .set_limit(20)
        .set_offset(40);

    assert_eq!(
        query.get_select_query(true),
        "SELECT  *  FROM tasks WHERE (data->>'status') =  $1  AND \
         ((data->>'callback_url') =  $2  OR (data->>'track') IS  NULL ) \
         ORDER BY data->>'create_time' DESC LIMIT 20 OFFSET 40"
    );
    assert_eq!(
        query.get_bind_params(),
        vec![BindValue::Text("enabled".into()), BindValue::Text("http://a".into())]
    );
}

#[test]
fn test_existence_operator_binds_text_array() {
    let query = Query::document("tasks")
        .add_condition_object(WhereField::new("tags", Operator::ExistsAll, vec!["a", "b"]));

    assert_eq!(
        query.get_select_query(true),
        "SELECT  *  FROM tasks WHERE (data->'tags') ?& array[$1,$2]"
    );
    assert_eq!(
        query.get_bind_params(),
        vec![BindValue::Text("a".into()), BindValue::Text("b".into())]
    );
}

#[test]
fn test_numeric_criteria_compare_as_text_unless_cast() {
    let text = Query::document("sub_tasks").add_condition_op("message_id", Operator::GreaterThan, 5i64);
    assert_eq!(
        text.get_select_query(true),
        "SELECT  *  FROM sub_tasks WHERE (data->>'message_id') >  $1 "
    );
    assert_eq!(text.get_bind_params(), vec![BindValue::Text("5".into())]);

    let cast = Query::document("sub_tasks").add_condition_object(
        WhereField::new("message_id", Operator::GreaterThan, 5i64).function(FieldFunction::cast("bigint")),
    );
    assert_eq!(
        cast.get_select_query(true),
        "SELECT  *  FROM sub_tasks WHERE (CAST(data->>'message_id' AS bigint)) >  $1 "
    );
    assert_eq!(cast.get_bind_params(), vec![BindValue::Int(5)]);
}

#[test]
fn test_grouped_subtask_counts() {
    let query = Query::document("sub_tasks")
        .add_select_field("task_id")
        .add_select_field_object(
            SelectField::new("message_id")
                .alias("messages")
                .function(FieldFunction::call("count")),
        )
        .set_group_by(&["task_id"]);

    assert_eq!(
        query.get_select_query(true),
        "SELECT data->>'task_id' AS task_id,count(data->>'message_id') AS messages \
         FROM sub_tasks GROUP BY data->>'task_id'"
    );
    assert!(query.get_bind_params().is_empty());
}

#[test]
fn test_inner_query_is_numbered_with_outer_query() {
    let inner = Query::document("sub_tasks")
        .add_select_field_object(
            SelectField::new("task_id")
                .alias("n")
                .function(FieldFunction::call("count")),
        )
        .add_condition("task_id", "t1");
    let outer = Query::document("tasks")
        .add_inner_select_query(inner, "outstanding")
        .add_condition("status", "enabled");

    assert_eq!(
        outer.get_select_query(true),
        "SELECT (SELECT count(data->>'task_id') AS n FROM sub_tasks WHERE (data->>'task_id') =  $1 ) \
         as outstanding FROM tasks WHERE (data->>'status') =  $2 "
    );
    assert_eq!(
        outer.get_bind_params(),
        vec![BindValue::Text("t1".into()), BindValue::Text("enabled".into())]
    );
}

#[test]
fn test_delete_by_nested_field() {
    let query = Query::document("tasks").add_condition("meta.owner.id", "u1");
    assert_eq!(
        query.get_delete_query().unwrap(),
        "DELETE FROM tasks WHERE (data->'meta'->'owner'->>'id') =  $1 "
    );
    assert_eq!(query.get_condition_bind_params(), vec![BindValue::Text("u1".into())]);
}

#[test]
fn test_criteria_field_list_keeps_numbering_aligned() {
    let query = Query::document("tasks")
        .add_condition_object(
            WhereField::new("items", Operator::ContainedBy, vec!["a", "b"]).criteria_field("sku"),
        )
        .add_condition("status", "enabled");

    let sql = query.get_select_query(true);
    let params = query.get_bind_params();
    assert_eq!(sql.matches('$').count(), params.len());
    assert_eq!(
        params,
        vec![
            BindValue::Json(serde_json::json!(["a", "b"])),
            BindValue::Text("enabled".into()),
        ]
    );
    assert!(sql.ends_with("(data->>'status') =  $2 "));
}
