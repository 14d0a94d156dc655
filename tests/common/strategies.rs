use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for JSON key segments as used in document field names
pub fn path_segment_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

/// Strategy for dotted document field names such as `metadata.source.host`
pub fn dotted_path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(path_segment_strategy(), 1..5)
}

/// Strategy for scalar criteria values
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ']{0,24}".prop_map(Value::from),
    ]
}

/// Strategy for flat message bodies
pub fn message_body_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(path_segment_strategy(), scalar_value_strategy(), 0..6)
        .prop_map(|entries| entries.into_iter().collect())
}
