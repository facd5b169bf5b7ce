//! Property tests for merge grouping and preserve backfill.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use tabnorm_core::{merge_rows, MergeMode, Row, Scalar, SourceSet};

const SOURCES: [&str; 3] = ["alpha", "beta", "gamma"];

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Unique ids, each with an optional fragment per source
fn fragments() -> impl Strategy<Value = Vec<(u32, [Option<i64>; 3])>> {
    prop::collection::btree_set(1u32..500, 1..25).prop_flat_map(|ids| {
        let ids: Vec<u32> = ids.into_iter().collect();
        let n = ids.len();
        (
            Just(ids),
            prop::collection::vec(prop::array::uniform3(prop::option::of(-50i64..50)), n),
        )
            .prop_map(|(ids, frags)| ids.into_iter().zip(frags).collect::<Vec<_>>())
    })
}

fn keyed_from_fragments(frags: &[(u32, [Option<i64>; 3])]) -> Value {
    let mut map = Map::new();
    for (idx, source) in SOURCES.iter().enumerate() {
        let rows: Vec<Value> = frags
            .iter()
            .filter_map(|(id, values)| {
                values[idx].map(|v| json!({"id": id, format!("v_{source}"): v}))
            })
            .collect();
        map.insert(source.to_string(), Value::Array(rows));
    }
    Value::Object(map)
}

/// Rows with colliding ids and sometimes-empty names
fn noisy_sources() -> impl Strategy<Value = Value> {
    let row = (0u8..6, prop::option::of(prop::sample::select(vec!["", "ana", "bo", "cy"])), any::<bool>())
        .prop_map(|(id, name, flag)| {
            let mut obj = Map::new();
            obj.insert("id".into(), json!(id));
            if let Some(name) = name {
                obj.insert("name".into(), json!(name));
            }
            obj.insert("flag".into(), json!(flag));
            Value::Object(obj)
        });
    prop::collection::vec(prop::collection::vec(row, 0..8), 1..4).prop_map(|groups| {
        let mut map = Map::new();
        for (idx, rows) in groups.into_iter().enumerate() {
            map.insert(format!("s{idx}"), Value::Array(rows));
        }
        Value::Object(map)
    })
}

proptest! {
    #[test]
    fn merge_with_unique_identities_is_lossless(frags in fragments()) {
        let sources = SourceSet::from_json(&keyed_from_fragments(&frags));
        let outcome = merge_rows(&fields(&["id"]), &[], &sources);

        let present: Vec<_> = frags
            .iter()
            .filter(|(_, values)| values.iter().any(Option::is_some))
            .collect();
        prop_assert_eq!(outcome.mode, MergeMode::Merged);
        prop_assert_eq!(outcome.rows.len(), present.len());

        for (id, values) in present {
            let row = outcome
                .rows
                .iter()
                .find(|r| r.get("id") == Some(&Scalar::from(*id as i64)))
                .expect("identity row exists");
            for (idx, source) in SOURCES.iter().enumerate() {
                let field = format!("v_{source}");
                let expected = values[idx].map(Scalar::from);
                prop_assert_eq!(row.get(&field).cloned(), expected);
            }
        }
    }

    #[test]
    fn preserve_backfill_is_idempotent(value in noisy_sources()) {
        let keys = fields(&["id"]);
        let preserve = fields(&["name"]);

        let once = merge_rows(&keys, &preserve, &SourceSet::from_json(&value));
        let twice = merge_rows(&keys, &preserve, &SourceSet::Flat(once.rows.clone()));

        prop_assert_eq!(once.rows, twice.rows);
    }

    #[test]
    fn merged_identities_are_distinct(value in noisy_sources()) {
        let keys = fields(&["id"]);
        let outcome = merge_rows(&keys, &[], &SourceSet::from_json(&value));

        let mut seen: Vec<String> = outcome.rows.iter().map(|r: &Row| r.key_string(&keys)).collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), total);
    }
}
