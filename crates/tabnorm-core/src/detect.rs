//! Heuristic detection of merge keys and preserved fields
//!
//! Field names shared by every source are classified by substring: names
//! that look like identifiers become merge keys, names that look like
//! descriptive labels become preserved fields. This is a guess; callers can
//! override either list through [`MergeConfig`](crate::process::MergeConfig).

use crate::row::Row;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Substrings that mark a field as a merge-key candidate
const KEY_HINTS: &[&str] = &["id", "code", "date", "key"];

/// Substrings that mark a field as a preserve candidate
const PRESERVE_HINTS: &[&str] = &["name", "team", "hq", "location"];

/// Result of auto-detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFields {
    /// Fields whose combined values identify a row
    pub merge_key_fields: Vec<String>,
    /// Fields whose first non-empty value sticks across merges
    pub preserve_fields: Vec<String>,
    /// Fields present in every source, in first-source order
    pub common_fields: Vec<String>,
    /// First preserve field that is also a merge key, if any
    pub identity_field: Option<String>,
}

/// Detect merge keys and preserved fields for a keyed source set
pub fn detect_merge_fields(sources: &IndexMap<String, Vec<Row>>) -> DetectedFields {
    let common_fields = common_fields(sources);

    let mut merge_key_fields: Vec<String> = common_fields
        .iter()
        .filter(|f| matches_hint(f, KEY_HINTS))
        .cloned()
        .collect();

    let preserve_fields: Vec<String> = common_fields
        .iter()
        .filter(|f| matches_hint(f, PRESERVE_HINTS))
        .cloned()
        .collect();

    if merge_key_fields.is_empty() {
        if let Some(first) = common_fields.first() {
            tracing::debug!(field = %first, "no key-like common field, falling back to first");
            merge_key_fields.push(first.clone());
        }
    }

    let identity_field = legacy_identity_field(&merge_key_fields, &preserve_fields);

    tracing::debug!(
        sources = sources.len(),
        common = ?common_fields,
        keys = ?merge_key_fields,
        preserve = ?preserve_fields,
        identity = ?identity_field,
        "detected merge fields"
    );

    DetectedFields {
        merge_key_fields,
        preserve_fields,
        common_fields,
        identity_field,
    }
}

/// The first preserve field that is also a merge key.
///
/// This is how older configurations chose the preserve-cache key implicitly.
pub fn legacy_identity_field(merge_key_fields: &[String], preserve_fields: &[String]) -> Option<String> {
    preserve_fields
        .iter()
        .find(|f| merge_key_fields.contains(f))
        .cloned()
}

/// Field names present in at least one row of every source
fn common_fields(sources: &IndexMap<String, Vec<Row>>) -> Vec<String> {
    let mut per_source = sources.values().map(|rows| {
        rows.iter()
            .flat_map(|row| row.keys())
            .collect::<IndexSet<&str>>()
    });

    let Some(first) = per_source.next() else {
        return Vec::new();
    };

    let rest: Vec<IndexSet<&str>> = per_source.collect();
    first
        .into_iter()
        .filter(|field| rest.iter().all(|set| set.contains(field)))
        .map(str::to_string)
        .collect()
}

fn matches_hint(field: &str, hints: &[&str]) -> bool {
    let lower = field.to_lowercase();
    hints.iter().any(|hint| lower.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceSet;
    use serde_json::{json, Value};

    fn keyed(value: Value) -> IndexMap<String, Vec<Row>> {
        match SourceSet::from_json(&value) {
            SourceSet::Keyed(sources) => sources,
            SourceSet::Flat(_) => panic!("fixture must be keyed"),
        }
    }

    #[test]
    fn test_detect_keys_and_preserve_fields() {
        let sources = keyed(json!({
            "employees": [{"employeeId": "E1", "fullName": "Ana", "team": "Ops", "salary": 10}],
            "checkins": [{"employeeId": "E1", "fullName": "Ana", "team": "Ops", "checkinDate": "2024-05-01"}]
        }));

        let detected = detect_merge_fields(&sources);
        assert_eq!(detected.common_fields, vec!["employeeId", "fullName", "team"]);
        assert_eq!(detected.merge_key_fields, vec!["employeeId"]);
        assert_eq!(detected.preserve_fields, vec!["fullName", "team"]);
        assert_eq!(detected.identity_field, None);
    }

    #[test]
    fn test_field_present_in_any_row_counts() {
        let sources = keyed(json!({
            "A": [{"id": 1}, {"id": 2, "location": "Lyon"}],
            "B": [{"id": 3, "location": null}]
        }));

        let detected = detect_merge_fields(&sources);
        assert_eq!(detected.common_fields, vec!["id", "location"]);
        assert_eq!(detected.preserve_fields, vec!["location"]);
    }

    #[test]
    fn test_hints_are_case_insensitive() {
        let sources = keyed(json!({
            "A": [{"SKU_CODE": "x", "HQ": "Paris", "Qty": 1}],
            "B": [{"SKU_CODE": "y", "HQ": "Rome", "Qty": 2}]
        }));

        let detected = detect_merge_fields(&sources);
        assert_eq!(detected.merge_key_fields, vec!["SKU_CODE"]);
        assert_eq!(detected.preserve_fields, vec!["HQ"]);
    }

    #[test]
    fn test_fallback_to_first_common_field() {
        let sources = keyed(json!({
            "A": [{"region": "north", "total": 1}],
            "B": [{"region": "south", "total": 2}]
        }));

        let detected = detect_merge_fields(&sources);
        assert_eq!(detected.merge_key_fields, vec!["region"]);
        assert!(detected.preserve_fields.is_empty());
    }

    #[test]
    fn test_no_common_fields() {
        let sources = keyed(json!({
            "A": [{"a": 1}],
            "B": [{"b": 2}]
        }));

        let detected = detect_merge_fields(&sources);
        assert!(detected.common_fields.is_empty());
        assert!(detected.merge_key_fields.is_empty());
    }

    #[test]
    fn test_empty_source_has_no_fields() {
        let sources = keyed(json!({
            "A": [{"id": 1}],
            "B": []
        }));

        assert_eq!(detect_merge_fields(&sources), DetectedFields::default());
    }

    #[test]
    fn test_identity_field_when_preserve_overlaps_key() {
        // "teamId" matches both hint lists
        let sources = keyed(json!({
            "A": [{"teamId": "t1", "teamName": "Red"}],
            "B": [{"teamId": "t1"}]
        }));

        let detected = detect_merge_fields(&sources);
        assert_eq!(detected.merge_key_fields, vec!["teamId"]);
        assert_eq!(detected.preserve_fields, vec!["teamId"]);
        assert_eq!(detected.identity_field.as_deref(), Some("teamId"));
    }
}
