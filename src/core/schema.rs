use crate::core::headers::standardize_header;
use crate::core::sniffer::detect_delimiter;
use crate::domain::model::UnifiedSchema;
use crate::utils::error::Result;
use csv::ReaderBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Reads only the header record of `path` and returns its canonical keys in file order.
/// Labels that standardize to an empty key are dropped.
pub fn read_canonical_headers(path: &Path, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .byte_headers()?
        .iter()
        .map(|raw| standardize_header(&String::from_utf8_lossy(raw)))
        .filter(|key| !key.is_empty())
        .collect();

    Ok(headers)
}

/// Sorted union of every file's canonical headers. Unreadable files are skipped.
pub fn collect_unified_schema(files: &[PathBuf]) -> UnifiedSchema {
    let mut columns = BTreeSet::new();

    for path in files {
        let headers = detect_delimiter(path).and_then(|delimiter| read_canonical_headers(path, delimiter));
        match headers {
            Ok(headers) => {
                tracing::debug!("{}: {} header(s)", path.display(), headers.len());
                columns.extend(headers);
            }
            Err(e) => {
                tracing::error!(
                    "❌ Skipping {} for schema collection: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    let schema = UnifiedSchema::from_columns(columns);
    if schema.is_empty() {
        tracing::warn!("⚠️ Unified schema is empty, every record will be empty");
    } else {
        tracing::info!(
            "🧩 Unified schema has {} column(s) across {} file(s)",
            schema.len(),
            files.len()
        );
    }
    schema
}
