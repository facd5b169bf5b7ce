//! tabnorm-core: Core library for merging row sources into one table
//!
//! This library provides functionality to:
//! - Load row sources from CSV and JSON files
//! - Detect merge keys and preserved fields from field names
//! - Merge keyed sources by composite identity, keeping sticky fields
//! - Infer typed column definitions for a data grid
//! - Export the normalized table as CSV or JSON

pub mod columns;
pub mod config;
pub mod detect;
pub mod error;
pub mod export;
pub mod merger;
pub mod parser;
pub mod process;
pub mod row;
pub mod scanner;
pub mod source;

pub use columns::{infer_columns, title_case, ColumnDef, ColumnOptions, ColumnType, SchemaScan};
pub use config::NormalizeConfig;
pub use detect::{detect_merge_fields, DetectedFields};
pub use error::{Error, Result};
pub use export::{write_csv, write_json};
pub use merger::{merge_rows, MergeMode, MergeOutcome, MergeSpec, Merger, PreserveIdentity};
pub use parser::{load_file, load_json, parse_csv, parse_csv_str, parse_json_str};
pub use process::{normalize, process_with_merge, resolve_spec, MergeConfig, NormalizedTable};
pub use row::{Row, Scalar};
pub use scanner::scan_sources;
pub use source::{needs_merging, SourceSet, GROUP_FIELD};
