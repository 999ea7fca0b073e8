//! Property-based test generators using proptest.
//!
//! Provides strategies for generating request lists and records that the
//! in-memory server accepts.

use bucketdb_protocol::{records_path, CollectionRef, RequestDescriptor};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for generating valid record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating valid bucket or collection names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating record data (flat objects of scalars).
pub fn record_data_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[ -~]{0,16}".prop_map(Value::from),
        ],
        0..6,
    )
    .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for generating record writes against one collection.
///
/// Ids are unique within a list, so every write creates a new record.
pub fn record_writes_strategy(
    collection: CollectionRef,
    max: usize,
) -> impl Strategy<Value = Vec<RequestDescriptor>> {
    prop::collection::btree_map(record_id_strategy(), record_data_strategy(), 0..=max).prop_map(
        move |records| {
            let base = records_path(&collection, None);
            records
                .into_iter()
                .map(|(id, data)| {
                    RequestDescriptor::put(format!("{base}/{id}"), json!({ "data": data }))
                })
                .collect()
        },
    )
}
