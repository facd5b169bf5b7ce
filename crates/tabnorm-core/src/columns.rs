//! Column schema inference for merged rows

use crate::row::{Row, Scalar};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Inferred display type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Boolean,
    Date,
    Datetime,
    Text,
}

impl ColumnType {
    /// Classify a single value. Total: every scalar maps to a type.
    pub fn of(value: &Scalar) -> Self {
        match value {
            Scalar::Number(_) => ColumnType::Number,
            Scalar::Bool(_) => ColumnType::Boolean,
            Scalar::Timestamp(_) => ColumnType::Datetime,
            Scalar::Text(s) if s.contains('T') && s.contains('Z') => ColumnType::Datetime,
            Scalar::Text(s) if has_date_prefix(s) => ColumnType::Date,
            Scalar::Text(_) | Scalar::Null => ColumnType::Text,
        }
    }
}

/// Display and type metadata for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub key: String,
    pub title: String,
    pub sortable: bool,
    pub filterable: bool,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(key: impl Into<String>, column_type: ColumnType) -> Self {
        let key = key.into();
        Self {
            title: title_case(&key),
            key,
            sortable: true,
            filterable: true,
            column_type,
        }
    }
}

/// Which rows contribute to the schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaScan {
    /// Keys and types come from the first row only. Fields that appear
    /// only in later rows get no column.
    #[default]
    FirstRow,
    /// Keys are the union over all rows in first-seen order; each type comes
    /// from the first non-null value of that column.
    FullScan,
}

/// Selection, ordering and visibility overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOptions {
    /// When non-empty, only these keys are kept
    pub fields: Option<Vec<String>>,
    /// Keys never shown
    pub hidden: Vec<String>,
    /// When non-empty, exactly these keys in this order (unknown keys skipped)
    pub order: Option<Vec<String>>,
    pub scan: SchemaScan,
}

/// Infer column definitions for `rows`
pub fn infer_columns(rows: &[Row], options: &ColumnOptions) -> Vec<ColumnDef> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let mut columns: Vec<ColumnDef> = match options.scan {
        SchemaScan::FirstRow => first
            .iter()
            .map(|(key, value)| ColumnDef::new(key, ColumnType::of(value)))
            .collect(),
        SchemaScan::FullScan => {
            let keys: IndexSet<&str> = rows.iter().flat_map(Row::keys).collect();
            keys.into_iter()
                .map(|key| {
                    let column_type = rows
                        .iter()
                        .filter_map(|row| row.get(key))
                        .find(|value| !value.is_null())
                        .map_or(ColumnType::Text, ColumnType::of);
                    ColumnDef::new(key, column_type)
                })
                .collect()
        }
    };

    if let Some(order) = options.order.as_ref().filter(|o| !o.is_empty()) {
        columns = order
            .iter()
            .filter_map(|key| columns.iter().find(|c| &c.key == key).cloned())
            .collect();
    }

    columns.retain(|c| !options.hidden.contains(&c.key));

    if let Some(fields) = options.fields.as_ref().filter(|f| !f.is_empty()) {
        columns.retain(|c| fields.contains(&c.key));
    }

    columns
}

/// Upper-case the first letter and put a space before every later capital
pub fn title_case(key: &str) -> String {
    let mut title = String::with_capacity(key.len() + 4);

    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            title.extend(c.to_uppercase());
            continue;
        }
        if c.is_uppercase() {
            title.push(' ');
        }
        title.push(c);
    }

    title
}

/// Starts with `YYYY-MM-DD` digits. The calendar values are not checked.
fn has_date_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..10].iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
