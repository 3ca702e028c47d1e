use crate::adapters::sink::{open_sink, output_path_for};
use crate::core::address::{attach_coordinates, resolve_coordinates};
use crate::core::headers::standardize_header;
use crate::core::sniffer::{detect_delimiter, detect_file_format};
use crate::core::transformer::RowTransformer;
use crate::domain::model::{FileMetrics, FileOutcome, FileStage, OutputRecord, RawRow};
use crate::domain::ports::{Geocoder, RecordSink};
use crate::utils::error::{EtlError, RowError};
use csv::{ByteRecord, Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Geocoding collaborator plus the locality appended to every search string.
pub struct Enrichment<'a> {
    pub geocoder: &'a dyn Geocoder,
    pub locality: Option<&'a str>,
}

/// Streams one input file through the transformer into one output file.
///
/// Rows are pulled one at a time; the next row is read only after the current
/// record has been written. Row failures are counted, stream failures end the file.
pub struct StreamPipeline<'a> {
    transformer: &'a RowTransformer,
    output_dir: &'a Path,
    enrichment: Option<Enrichment<'a>>,
}

struct OpenFile {
    reader: Reader<File>,
    columns: Vec<String>,
    sink: Box<dyn RecordSink>,
    output: PathBuf,
}

impl<'a> StreamPipeline<'a> {
    pub fn new(transformer: &'a RowTransformer, output_dir: &'a Path) -> Self {
        Self {
            transformer,
            output_dir,
            enrichment: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment<'a>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub async fn process_file(&self, input: &Path) -> FileOutcome {
        let started = Instant::now();
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut metrics = FileMetrics::new(input.to_path_buf(), detect_file_format(&file_name));
        let mut stage = FileStage::Start;

        macro_rules! fail {
            ($err:expr) => {{
                metrics.wall_time = started.elapsed();
                let reason = $err.to_string();
                tracing::error!(
                    "❌ {} failed during {:?}: {}",
                    input.display(),
                    stage,
                    reason
                );
                return FileOutcome::Failed {
                    metrics,
                    stage,
                    reason,
                };
            }};
        }

        advance(&mut stage, FileStage::HeaderScan, input);
        let delimiter = match detect_delimiter(input) {
            Ok(delimiter) => delimiter,
            Err(e) => fail!(e),
        };

        advance(&mut stage, FileStage::Open, input);
        let mut open = match self.open(input, delimiter) {
            Ok(open) => open,
            Err(e) => fail!(e),
        };
        tracing::info!(
            "📂 {} ({:?}, delimiter {:?}) -> {}",
            file_name,
            metrics.kind,
            delimiter as char,
            open.output.display()
        );

        advance(&mut stage, FileStage::Streaming, input);
        let mut record = ByteRecord::new();
        loop {
            match open.reader.read_byte_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.is_io_error() => fail!(e),
                Err(e) => {
                    metrics.rows_read += 1;
                    metrics.rows_failed += 1;
                    let line = e.position().map(|p| p.line()).unwrap_or(metrics.rows_read + 1);
                    tracing::warn!("⚠️ {}: skipping line {}: {}", file_name, line, e);
                    continue;
                }
            }

            metrics.rows_read += 1;
            let row_started = Instant::now();
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(metrics.rows_read + 1);

            match self.process_row(&open.columns, &record, line).await {
                Ok(output) => {
                    if let Err(e) = open.sink.write_record(&output) {
                        fail!(e);
                    }
                    metrics.rows_written += 1;
                }
                Err(row_error) => {
                    metrics.rows_failed += 1;
                    tracing::warn!(
                        "⚠️ {}: skipped row at line {}: {} | content: {}",
                        file_name,
                        row_error.line(),
                        row_error,
                        render_row(&record, delimiter)
                    );
                }
            }
            metrics.row_time += row_started.elapsed();
            metrics.rows_timed += 1;
        }

        advance(&mut stage, FileStage::Flush, input);
        if let Err(e) = open.sink.finish() {
            fail!(e);
        }

        advance(&mut stage, FileStage::Done, input);
        metrics.wall_time = started.elapsed();
        tracing::info!(
            "✅ {}: {} row(s) written, {} failed, {:?}",
            file_name,
            metrics.rows_written,
            metrics.rows_failed,
            metrics.wall_time
        );
        FileOutcome::Done(metrics)
    }

    fn open(&self, input: &Path, delimiter: u8) -> Result<OpenFile, EtlError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(input)?;

        // 以欄位位置對應標準化表頭，空白表頭保留位置但不輸出
        let columns = reader
            .byte_headers()?
            .iter()
            .map(|raw| standardize_header(&String::from_utf8_lossy(raw)))
            .collect();

        let output = output_path_for(input, self.output_dir, self.transformer.mode());
        if is_same_file(input, &output) {
            return Err(EtlError::OutputConflictError {
                path: output,
                message: "output would overwrite its own input".to_string(),
            });
        }
        let mut sink = open_sink(self.transformer.mode(), &output)?;
        sink.write_header(self.transformer.schema())?;

        Ok(OpenFile {
            reader,
            columns,
            sink,
            output,
        })
    }

    async fn process_row(
        &self,
        columns: &[String],
        record: &ByteRecord,
        line: u64,
    ) -> Result<OutputRecord, RowError> {
        let decoded = StringRecord::from_byte_record(record.clone())
            .map_err(|_| RowError::InvalidUtf8 { line })?;
        let raw = map_row(columns, &decoded);

        let mut output = self.transformer.transform(&raw, line)?;
        if let Some(enrichment) = &self.enrichment {
            let coordinates =
                resolve_coordinates(enrichment.geocoder, &raw, enrichment.locality).await;
            attach_coordinates(&mut output, coordinates);
        }
        Ok(output)
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn advance(stage: &mut FileStage, next: FileStage, input: &Path) {
    tracing::debug!("{}: {:?} -> {:?}", input.display(), stage, next);
    *stage = next;
}

/// Pairs values with canonical headers. For duplicated keys the first non-empty value wins.
pub fn map_row(columns: &[String], record: &StringRecord) -> RawRow {
    let mut raw = RawRow::new();
    for (key, value) in columns.iter().zip(record.iter()) {
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        match raw.get(key) {
            Some(existing) if !existing.is_empty() => {}
            _ => {
                raw.insert(key.clone(), value.to_string());
            }
        }
    }
    raw
}

fn render_row(record: &ByteRecord, delimiter: u8) -> String {
    let joined = record.iter().collect::<Vec<_>>().join(&[delimiter][..]);
    String::from_utf8_lossy(&joined).into_owned()
}
