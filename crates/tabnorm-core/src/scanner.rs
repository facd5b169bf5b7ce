//! Directory scanner for discovering row sources on disk

use crate::error::{Error, Result};
use crate::parser::{is_csv, load_json, parse_csv};
use crate::source::SourceSet;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scan one or more directories for `.csv` and `.json` files and build a keyed source set.
///
/// Each file becomes a source named by its file stem. A JSON file holding a
/// keyed object contributes its own sources instead, named `stem/source`.
/// Sources are ordered by name so repeated scans merge identically.
pub fn scan_sources<P: AsRef<Path>>(roots: &[P]) -> Result<SourceSet> {
    let mut files: Vec<PathBuf> = Vec::new();

    for root in roots {
        let root = root.as_ref();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && is_source_file(path) {
                files.push(path.to_path_buf());
            }
        }
    }

    if files.is_empty() {
        return Err(Error::NoSources(
            roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        ));
    }

    let mut named: Vec<(String, PathBuf)> = files
        .into_iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            Some((stem, path))
        })
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut sources: IndexMap<String, Vec<_>> = IndexMap::new();
    for (stem, path) in named {
        if is_csv(&path) {
            sources.entry(stem).or_default().extend(parse_csv(&path)?);
            continue;
        }

        match load_json(&path)? {
            SourceSet::Flat(rows) => sources.entry(stem).or_default().extend(rows),
            SourceSet::Keyed(inner) => {
                for (name, rows) in inner {
                    sources
                        .entry(format!("{stem}/{name}"))
                        .or_default()
                        .extend(rows);
                }
            }
        }
    }

    tracing::debug!(sources = sources.len(), "scanned sources");
    Ok(SourceSet::Keyed(sources))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("json"))
}
