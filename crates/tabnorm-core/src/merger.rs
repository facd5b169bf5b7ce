//! Merge engine for combining keyed row sources by composite identity

use crate::detect::legacy_identity_field;
use crate::row::{Row, Scalar};
use crate::source::SourceSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the preserve cache groups rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreserveIdentity {
    /// Group by the full merge identity
    #[default]
    CompositeKey,
    /// Group by the value of one field; rows where it is absent, null or
    /// empty text are not cached
    Field(String),
}

impl PreserveIdentity {
    /// Resolve the identity implicitly: the first preserve field that is
    /// also a merge key.
    ///
    /// When no field overlaps this falls back to [`PreserveIdentity::CompositeKey`]
    /// instead of caching every row under one shared bucket.
    pub fn legacy(key_fields: &[String], preserve_fields: &[String]) -> Self {
        legacy_identity_field(key_fields, preserve_fields)
            .map_or(PreserveIdentity::CompositeKey, PreserveIdentity::Field)
    }
}

/// Declarative merge settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Fields whose values, joined by `||`, identify a row
    pub key_fields: Vec<String>,
    /// Fields whose first non-empty value is carried into the merged row
    pub preserve_fields: Vec<String>,
    /// Grouping used for preserved values
    pub identity: PreserveIdentity,
}

impl MergeSpec {
    pub fn new(
        key_fields: Vec<String>,
        preserve_fields: Vec<String>,
        identity: PreserveIdentity,
    ) -> Self {
        Self {
            key_fields,
            preserve_fields,
            identity,
        }
    }
}

/// Whether rows were merged or passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Rows were grouped by merge identity
    Merged,
    /// No merge keys resolved; rows were flattened and tagged with their source
    PassThrough,
    /// Input was already a flat row sequence
    Flat,
}

/// Rows produced by a merge, plus how they were produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub rows: Vec<Row>,
    pub mode: MergeMode,
}

impl MergeOutcome {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A configured merge, applied to any number of source sets
#[derive(Debug, Clone)]
pub struct Merger {
    spec: MergeSpec,
}

impl Merger {
    pub fn new(spec: MergeSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &MergeSpec {
        &self.spec
    }

    /// Merge a source set. Flat sets are treated as one source.
    pub fn merge(&self, sources: &SourceSet) -> MergeOutcome {
        if self.spec.key_fields.is_empty() {
            tracing::warn!(
                sources = sources.source_count(),
                rows = sources.row_count(),
                "no merge keys resolved, passing rows through"
            );
            return MergeOutcome {
                rows: sources.flatten_tagged(),
                mode: MergeMode::PassThrough,
            };
        }

        let rows = sources.flatten();
        let cache = self.build_preserve_cache(&rows);

        let mut merged: IndexMap<String, Row> = IndexMap::new();
        for row in &rows {
            let key = row.key_string(&self.spec.key_fields);
            match merged.get_mut(&key) {
                Some(existing) => existing.overlay(row),
                None => {
                    merged.insert(key, row.clone());
                }
            }
        }

        let mut output: Vec<Row> = merged.into_values().collect();
        for row in &mut output {
            self.backfill(row, &cache);
        }

        tracing::debug!(
            input_rows = rows.len(),
            output_rows = output.len(),
            keys = ?self.spec.key_fields,
            "merged rows"
        );

        MergeOutcome {
            rows: output,
            mode: MergeMode::Merged,
        }
    }

    /// Identity under which a row's preserved values are cached, if any
    fn preserve_identity(&self, row: &Row) -> Option<String> {
        match &self.spec.identity {
            PreserveIdentity::CompositeKey => Some(row.key_string(&self.spec.key_fields)),
            PreserveIdentity::Field(field) => row
                .get(field)
                .filter(|value| !value.is_blank())
                .map(Scalar::to_string_value),
        }
    }

    /// First non-empty value per preserve field, per identity
    fn build_preserve_cache(&self, rows: &[Row]) -> HashMap<String, HashMap<String, Scalar>> {
        let mut cache: HashMap<String, HashMap<String, Scalar>> = HashMap::new();
        if self.spec.preserve_fields.is_empty() {
            return cache;
        }

        for row in rows {
            let Some(identity) = self.preserve_identity(row) else {
                continue;
            };
            let entry = cache.entry(identity).or_default();
            for field in &self.spec.preserve_fields {
                if entry.contains_key(field) {
                    continue;
                }
                if let Some(value) = row.get(field).filter(|v| !v.is_empty()) {
                    entry.insert(field.clone(), value.clone());
                }
            }
        }

        cache
    }

    fn backfill(&self, row: &mut Row, cache: &HashMap<String, HashMap<String, Scalar>>) {
        let Some(cached) = self
            .preserve_identity(row)
            .and_then(|identity| cache.get(&identity))
        else {
            return;
        };

        for field in &self.spec.preserve_fields {
            if row.field_is_empty(field) {
                if let Some(value) = cached.get(field) {
                    row.insert(field.clone(), value.clone());
                }
            }
        }
    }
}

/// Merge `sources` by `key_fields`, carrying `preserve_fields` per composite identity
pub fn merge_rows(
    key_fields: &[String],
    preserve_fields: &[String],
    sources: &SourceSet,
) -> MergeOutcome {
    Merger::new(MergeSpec::new(
        key_fields.to_vec(),
        preserve_fields.to_vec(),
        PreserveIdentity::CompositeKey,
    ))
    .merge(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::GROUP_FIELD;
    use serde_json::{json, Value};

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn rows_json(outcome: &MergeOutcome) -> Value {
        Value::Array(outcome.rows.iter().map(Row::to_json).collect())
    }

    #[test]
    fn test_merge_basic_example() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "name": "x"}, {"id": 2}],
            "B": [{"id": 2, "name": "y"}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &fields(&["name"]), &sources);
        assert_eq!(outcome.mode, MergeMode::Merged);
        assert_eq!(
            rows_json(&outcome),
            json!([{"id": 1, "name": "x"}, {"id": 2, "name": "y"}])
        );
    }

    #[test]
    fn test_preserved_value_survives_later_row_without_it() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "name": "x"}, {"id": 2}],
            "B": [{"id": 2, "name": "y"}],
            "C": [{"id": 2, "name": ""}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &fields(&["name"]), &sources);
        assert_eq!(
            rows_json(&outcome),
            json!([{"id": 1, "name": "x"}, {"id": 2, "name": "y"}])
        );
    }

    #[test]
    fn test_preserved_value_survives_later_row_missing_the_field() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "name": "x"}, {"id": 2}],
            "B": [{"id": 2, "name": "y"}],
            "C": [{"id": 2}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &fields(&["name"]), &sources);
        assert_eq!(
            rows_json(&outcome),
            json!([{"id": 1, "name": "x"}, {"id": 2, "name": "y"}])
        );
    }

    #[test]
    fn test_field_identity_zero_is_a_real_identity() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"teamId": 0, "teamName": "Red"}],
            "B": [{"teamId": 0, "teamName": ""}],
            "C": [{"teamId": 1, "teamName": "Blue"}],
            "D": [{"teamId": 1, "teamName": ""}]
        }));

        let spec = MergeSpec::new(
            fields(&["teamId"]),
            fields(&["teamName"]),
            PreserveIdentity::Field("teamId".to_string()),
        );
        let outcome = Merger::new(spec).merge(&sources);
        assert_eq!(
            rows_json(&outcome),
            json!([
                {"teamId": 0, "teamName": "Red"},
                {"teamId": 1, "teamName": "Blue"}
            ])
        );
    }

    #[test]
    fn test_first_non_empty_value_is_frozen() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "team": null}],
            "B": [{"id": 1, "team": "Ops"}],
            "C": [{"id": 1, "team": "Sales"}, {"id": 1, "team": 0}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &fields(&["team"]), &sources);
        // last row blanked the team with 0, backfill restores the first value seen
        assert_eq!(rows_json(&outcome), json!([{"id": 1, "team": "Ops"}]));
    }

    #[test]
    fn test_later_rows_override_non_preserved_fields() {
        let sources = SourceSet::from_json(&json!({
            "base": [{"id": 1, "total": 10, "note": "a"}],
            "patch": [{"id": 1, "total": 12}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &[], &sources);
        assert_eq!(
            rows_json(&outcome),
            json!([{"id": 1, "total": 12, "note": "a"}])
        );
    }

    #[test]
    fn test_composite_key_and_first_seen_order() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"code": "b", "date": "2024-01-02", "v": 1}, {"code": "a", "date": "2024-01-01", "v": 2}],
            "B": [{"code": "a", "date": "2024-01-01", "w": 3}, {"code": "a", "date": "2024-01-02", "w": 4}]
        }));

        let outcome = merge_rows(&fields(&["code", "date"]), &[], &sources);
        assert_eq!(
            rows_json(&outcome),
            json!([
                {"code": "b", "date": "2024-01-02", "v": 1},
                {"code": "a", "date": "2024-01-01", "v": 2, "w": 3},
                {"code": "a", "date": "2024-01-02", "w": 4}
            ])
        );
    }

    #[test]
    fn test_rows_without_key_fields_collapse_to_one() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"v": 1}],
            "B": [{"w": 2}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &[], &sources);
        assert_eq!(rows_json(&outcome), json!([{"v": 1, "w": 2}]));
    }

    #[test]
    fn test_number_and_string_keys_match_by_text() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 7, "a": 1}],
            "B": [{"id": "7", "b": 2}]
        }));

        let outcome = merge_rows(&fields(&["id"]), &[], &sources);
        assert_eq!(outcome.row_count(), 1);
    }

    #[test]
    fn test_no_keys_passes_through_with_group_tags() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"v": 1}],
            "B": [{"v": 2}]
        }));

        let outcome = merge_rows(&[], &fields(&["name"]), &sources);
        assert_eq!(outcome.mode, MergeMode::PassThrough);
        assert_eq!(
            rows_json(&outcome),
            json!([{"v": 1, GROUP_FIELD: "A"}, {"v": 2, GROUP_FIELD: "B"}])
        );
    }

    #[test]
    fn test_field_identity_shares_values_across_composite_keys() {
        let sources = SourceSet::from_json(&json!({
            "people": [{"id": "E1", "date": "2024-01-01", "name": "Ana"}],
            "shifts": [{"id": "E1", "date": "2024-01-02", "hours": 8}]
        }));

        let spec = MergeSpec::new(
            fields(&["id", "date"]),
            fields(&["name"]),
            PreserveIdentity::Field("id".to_string()),
        );
        let outcome = Merger::new(spec).merge(&sources);
        assert_eq!(
            rows_json(&outcome),
            json!([
                {"id": "E1", "date": "2024-01-01", "name": "Ana"},
                {"id": "E1", "date": "2024-01-02", "hours": 8, "name": "Ana"}
            ])
        );
    }

    #[test]
    fn test_field_identity_does_not_bleed_across_rows_missing_it() {
        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "name": "x"}],
            "B": [{"id": 2}]
        }));

        // identity field absent everywhere: nothing is cached or backfilled
        let spec = MergeSpec::new(
            fields(&["id"]),
            fields(&["name"]),
            PreserveIdentity::Field("employee".to_string()),
        );
        let outcome = Merger::new(spec).merge(&sources);
        assert_eq!(rows_json(&outcome), json!([{"id": 1, "name": "x"}, {"id": 2}]));
    }

    #[test]
    fn test_legacy_identity_without_overlap_uses_composite_key() {
        // A single shared cache bucket would hand id 2 the name "x"
        let identity = PreserveIdentity::legacy(&fields(&["id"]), &fields(&["name"]));
        assert_eq!(identity, PreserveIdentity::CompositeKey);

        let sources = SourceSet::from_json(&json!({
            "A": [{"id": 1, "name": "x"}],
            "B": [{"id": 2}]
        }));
        let outcome = Merger::new(MergeSpec::new(fields(&["id"]), fields(&["name"]), identity))
            .merge(&sources);
        assert_eq!(rows_json(&outcome), json!([{"id": 1, "name": "x"}, {"id": 2}]));
    }

    #[test]
    fn test_legacy_identity_with_overlap() {
        let identity = PreserveIdentity::legacy(&fields(&["code", "id"]), &fields(&["name", "id"]));
        assert_eq!(identity, PreserveIdentity::Field("id".to_string()));
    }

    #[test]
    fn test_flat_set_merges_as_single_source() {
        let sources = SourceSet::from_json(&json!([
            {"id": 1, "v": "a"},
            {"id": 1, "v": "b"}
        ]));

        let outcome = merge_rows(&fields(&["id"]), &[], &sources);
        assert_eq!(rows_json(&outcome), json!([{"id": 1, "v": "b"}]));
    }
}
