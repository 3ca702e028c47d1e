use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One input line keyed by standardized header.
pub type RawRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Tsv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputMode {
    /// Semicolon-delimited file with every column of the unified schema.
    #[default]
    Unified,
    /// Newline-delimited JSON with `tipo`, `situacao`, `datahora` and `meta`.
    Ndjson,
}

impl OutputMode {
    pub fn file_extension(self) -> &'static str {
        match self {
            OutputMode::Unified => "csv",
            OutputMode::Ndjson => "ndjson",
        }
    }
}

/// Sorted, de-duplicated canonical headers of a batch. Built once, then read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedSchema {
    columns: Vec<String>,
}

impl UnifiedSchema {
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        columns.sort();
        columns.dedup();
        Self { columns }
    }

    pub fn with_columns(&self, extra: &[&str]) -> Self {
        Self::from_columns(
            self.columns
                .iter()
                .map(String::as_str)
                .chain(extra.iter().copied()),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.binary_search_by(|c| c.as_str().cmp(column)).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            // 整數值不輸出小數點 (3 而非 3.0)
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A row spread over the unified schema: exactly one value per schema column.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Values in schema order, ready for a delimited writer.
    pub fn values_in<'a>(&'a self, schema: &'a UnifiedSchema) -> impl Iterator<Item = String> + 'a {
        schema.columns().iter().map(move |column| {
            self.fields
                .get(column)
                .map(ToString::to_string)
                .unwrap_or_default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdjsonRecord {
    pub tipo: String,
    pub situacao: String,
    pub datahora: String,
    /// JSON-encoded object of every residual raw field.
    pub meta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputRecord {
    Unified(NormalizedRecord),
    Ndjson(NdjsonRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Start,
    HeaderScan,
    Open,
    Streaming,
    Flush,
    Done,
    /// Terminal; `FileOutcome::Failed` records the stage it was reached from.
    Failed,
}

#[derive(Debug, Clone)]
pub struct FileMetrics {
    pub file: PathBuf,
    pub kind: FileKind,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_failed: u64,
    /// Rows that reached the transformer; csv parse errors are never timed.
    pub rows_timed: u64,
    /// Sum of the time spent transforming and writing each row.
    pub row_time: Duration,
    pub wall_time: Duration,
}

impl FileMetrics {
    pub fn new(file: PathBuf, kind: FileKind) -> Self {
        Self {
            file,
            kind,
            rows_read: 0,
            rows_written: 0,
            rows_failed: 0,
            rows_timed: 0,
            row_time: Duration::ZERO,
            wall_time: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Done(FileMetrics),
    Failed {
        metrics: FileMetrics,
        stage: FileStage,
        reason: String,
    },
}

impl FileOutcome {
    pub fn metrics(&self) -> &FileMetrics {
        match self {
            FileOutcome::Done(metrics) | FileOutcome::Failed { metrics, .. } => metrics,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub files_total: usize,
    pub files_succeeded: usize,
    /// Failed files with the reason they were aborted.
    pub failed_files: Vec<(PathBuf, String)>,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_failed: u64,
    pub rows_timed: u64,
    pub row_time: Duration,
    pub elapsed: Duration,
    pub schema_columns: usize,
}

impl RunMetrics {
    pub fn record(&mut self, outcome: &FileOutcome) {
        let metrics = outcome.metrics();
        self.files_total += 1;
        self.rows_read += metrics.rows_read;
        self.rows_written += metrics.rows_written;
        self.rows_failed += metrics.rows_failed;
        self.rows_timed += metrics.rows_timed;
        self.row_time += metrics.row_time;

        match outcome {
            FileOutcome::Done(_) => self.files_succeeded += 1,
            FileOutcome::Failed { reason, .. } => {
                self.failed_files.push((metrics.file.clone(), reason.clone()))
            }
        }
    }

    pub fn average_row_time(&self) -> Duration {
        if self.rows_timed == 0 {
            Duration::ZERO
        } else {
            self.row_time / u32::try_from(self.rows_timed).unwrap_or(u32::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sorted_and_unique() {
        let schema = UnifiedSchema::from_columns(["tipo", "data", "hora", "data"]);
        assert_eq!(schema.columns(), &["data", "hora", "tipo"]);
        assert!(schema.contains("hora"));
        assert!(!schema.contains("situacao"));

        let extended = schema.with_columns(&["latitude", "longitude"]);
        assert_eq!(
            extended.columns(),
            &["data", "hora", "latitude", "longitude", "tipo"]
        );
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(FieldValue::Number(3.0).to_string(), "3");
        assert_eq!(FieldValue::Number(1.5).to_string(), "1.5");
        assert_eq!(FieldValue::Number(0.0).to_string(), "0");
        assert_eq!(FieldValue::Text("Colisão".into()).to_string(), "Colisão");
    }

    #[test]
    fn test_run_metrics_fold() {
        let mut ok = FileMetrics::new(PathBuf::from("a.csv"), FileKind::Csv);
        ok.rows_read = 3;
        ok.rows_written = 2;
        ok.rows_failed = 1;
        let failed = FileMetrics::new(PathBuf::from("b.tsv"), FileKind::Tsv);

        let mut run = RunMetrics::default();
        run.record(&FileOutcome::Done(ok));
        run.record(&FileOutcome::Failed {
            metrics: failed,
            stage: FileStage::Open,
            reason: "unreadable".into(),
        });

        assert_eq!(run.files_total, 2);
        assert_eq!(run.files_succeeded, 1);
        assert_eq!(run.rows_written, 2);
        assert_eq!(run.rows_failed, 1);
        assert_eq!(run.failed_files[0].0, PathBuf::from("b.tsv"));
    }

    #[test]
    fn test_average_row_time_ignores_untimed_rows() {
        let mut metrics = FileMetrics::new(PathBuf::from("a.csv"), FileKind::Csv);
        metrics.rows_read = 4;
        metrics.rows_failed = 2;
        metrics.rows_timed = 2;
        metrics.row_time = Duration::from_millis(10);

        let mut run = RunMetrics::default();
        assert_eq!(run.average_row_time(), Duration::ZERO);
        run.record(&FileOutcome::Done(metrics));
        assert_eq!(run.average_row_time(), Duration::from_millis(5));
    }
}
