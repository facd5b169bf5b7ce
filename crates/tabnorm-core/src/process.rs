//! Entry points tying detection, merge and column inference together

use crate::columns::{infer_columns, ColumnDef};
use crate::config::NormalizeConfig;
use crate::detect::detect_merge_fields;
use crate::merger::{MergeMode, MergeOutcome, MergeSpec, Merger, PreserveIdentity};
use crate::row::Row;
use crate::source::SourceSet;
use serde::{Deserialize, Serialize};

/// Explicit merge overrides. Unset lists fall back to auto-detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub merge_key_fields: Option<Vec<String>>,
    pub preserve_fields: Option<Vec<String>>,
    /// Field keying the preserve cache; the composite key when unset
    pub identity_field: Option<String>,
}

/// Merged rows with their inferred columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub rows: Vec<Row>,
    pub columns: Vec<ColumnDef>,
    pub mode: MergeMode,
    pub merge_key_fields: Vec<String>,
    pub preserve_fields: Vec<String>,
}

impl NormalizedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Find a column by key
    pub fn find_column(&self, key: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.key == key)
    }
}

/// Resolve the merge spec for a source set.
///
/// Explicit lists win; missing ones are detected when `auto_merge_enabled`.
/// Returns None for flat input, which never needs merging.
pub fn resolve_spec(
    data: &SourceSet,
    auto_merge_enabled: bool,
    config: &MergeConfig,
) -> Option<MergeSpec> {
    let SourceSet::Keyed(sources) = data else {
        return None;
    };

    let detected = auto_merge_enabled.then(|| detect_merge_fields(sources));

    let key_fields = config
        .merge_key_fields
        .clone()
        .or_else(|| detected.as_ref().map(|d| d.merge_key_fields.clone()))
        .unwrap_or_default();

    let preserve_fields = config
        .preserve_fields
        .clone()
        .or_else(|| detected.as_ref().map(|d| d.preserve_fields.clone()))
        .unwrap_or_default();

    let identity = config
        .identity_field
        .clone()
        .or_else(|| detected.and_then(|d| d.identity_field))
        .map_or(PreserveIdentity::CompositeKey, PreserveIdentity::Field);

    Some(MergeSpec::new(key_fields, preserve_fields, identity))
}

/// Merge keyed data, or pass flat data through unchanged
pub fn process_with_merge(
    data: &SourceSet,
    auto_merge_enabled: bool,
    config: &MergeConfig,
) -> MergeOutcome {
    let spec = resolve_spec(data, auto_merge_enabled, config);
    merge_resolved(data, spec.as_ref())
}

/// Apply a resolved spec; no spec means flat input
fn merge_resolved(data: &SourceSet, spec: Option<&MergeSpec>) -> MergeOutcome {
    match spec {
        Some(spec) => Merger::new(spec.clone()).merge(data),
        None => MergeOutcome {
            rows: data.flatten(),
            mode: MergeMode::Flat,
        },
    }
}

/// Merge and infer columns in one pass
pub fn normalize(data: &SourceSet, config: &NormalizeConfig) -> NormalizedTable {
    let spec = resolve_spec(data, config.auto_merge, &config.merge);
    let outcome = merge_resolved(data, spec.as_ref());
    let columns = infer_columns(&outcome.rows, &config.columns);

    tracing::info!(
        rows = outcome.rows.len(),
        columns = columns.len(),
        mode = ?outcome.mode,
        "normalized table"
    );

    let (merge_key_fields, preserve_fields) = spec
        .map(|s| (s.key_fields, s.preserve_fields))
        .unwrap_or_default();

    NormalizedTable {
        rows: outcome.rows,
        columns,
        mode: outcome.mode,
        merge_key_fields,
        preserve_fields,
    }
}
