//! Source sets: the row groups handed to the normalizer

use crate::row::Row;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved field carrying the originating source name on pass-through rows
pub const GROUP_FIELD: &str = "__group";

/// Named or unnamed groups of rows to be combined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSet {
    /// Source name -> rows, in caller order
    Keyed(IndexMap<String, Vec<Row>>),
    /// One untagged sequence of rows
    Flat(Vec<Row>),
}

impl Default for SourceSet {
    fn default() -> Self {
        SourceSet::Flat(Vec::new())
    }
}

impl SourceSet {
    /// Build a source set from arbitrary JSON.
    ///
    /// Objects holding at least one array are keyed; only their array
    /// entries become sources. Arrays are flat. A lone object is a single
    /// row. Non-object row entries are skipped.
    pub fn from_json(value: &Value) -> Self {
        if needs_merging(value) {
            let mut sources = IndexMap::new();
            if let Value::Object(map) = value {
                for (name, entry) in map {
                    if let Value::Array(items) = entry {
                        sources.insert(name.clone(), rows_from_array(name, items));
                    } else {
                        tracing::debug!(source = %name, "ignoring non-array source entry");
                    }
                }
            }
            return SourceSet::Keyed(sources);
        }

        match value {
            Value::Array(items) => SourceSet::Flat(rows_from_array("<flat>", items)),
            Value::Object(_) => SourceSet::Flat(Row::from_json(value).into_iter().collect()),
            other => {
                tracing::debug!(kind = json_kind(other), "input is not tabular, treating as empty");
                SourceSet::Flat(Vec::new())
            }
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, SourceSet::Keyed(_))
    }

    /// Number of sources (1 for a flat set)
    pub fn source_count(&self) -> usize {
        match self {
            SourceSet::Keyed(sources) => sources.len(),
            SourceSet::Flat(_) => 1,
        }
    }

    /// Total number of rows across all sources
    pub fn row_count(&self) -> usize {
        match self {
            SourceSet::Keyed(sources) => sources.values().map(Vec::len).sum(),
            SourceSet::Flat(rows) => rows.len(),
        }
    }

    /// All rows in source order, without tagging
    pub fn flatten(&self) -> Vec<Row> {
        match self {
            SourceSet::Keyed(sources) => sources.values().flatten().cloned().collect(),
            SourceSet::Flat(rows) => rows.clone(),
        }
    }

    /// All rows in source order, each tagged with its source under [`GROUP_FIELD`]
    pub fn flatten_tagged(&self) -> Vec<Row> {
        match self {
            SourceSet::Keyed(sources) => sources
                .iter()
                .flat_map(|(name, rows)| {
                    rows.iter().map(move |row| {
                        let mut tagged = row.clone();
                        tagged.insert(GROUP_FIELD, name.as_str());
                        tagged
                    })
                })
                .collect(),
            SourceSet::Flat(rows) => rows.clone(),
        }
    }
}

/// True iff `value` is a non-array object with at least one array among its values
pub fn needs_merging(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().any(Value::is_array),
        _ => false,
    }
}

fn rows_from_array(source: &str, items: &[Value]) -> Vec<Row> {
    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match Row::from_json(item) {
            Some(row) => rows.push(row),
            None => tracing::debug!(
                source,
                index = idx,
                kind = json_kind(item),
                "skipping non-object row"
            ),
        }
    }
    rows
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
