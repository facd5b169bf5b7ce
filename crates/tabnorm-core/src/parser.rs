//! Loaders turning CSV and JSON files into rows

use crate::error::{Error, Result};
use crate::row::{Row, Scalar};
use crate::source::SourceSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

/// Parse a CSV file into rows keyed by its header
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    read_csv(BufReader::new(file), path)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Vec<Row>> {
    read_csv(content.as_bytes(), Path::new(source_name))
}

fn read_csv<R: Read>(reader: R, path: &Path) -> Result<Vec<Row>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::CsvParse {
            path: path.to_path_buf(),
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

        if record.len() > headers.len() {
            tracing::warn!(
                row = row_idx + 1,
                path = %path.display(),
                "row has more cells than columns, truncating"
            );
        }

        // Short rows simply lack the trailing fields
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, cell)| (name.clone(), Scalar::parse(cell)))
            .collect();

        rows.push(row);
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "parsed CSV");
    Ok(rows)
}

/// Load a JSON document as a source set (keyed object or flat array)
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<SourceSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_json_str(&content)
}

/// Parse a JSON string as a source set
pub fn parse_json_str(content: &str) -> Result<SourceSet> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    Ok(SourceSet::from_json(&value))
}

/// Load a single input file, choosing the loader by extension
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<SourceSet> {
    let path = path.as_ref();
    if is_csv(path) {
        parse_csv(path).map(SourceSet::Flat)
    } else {
        load_json(path)
    }
}

pub(crate) fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
