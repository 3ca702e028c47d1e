use crate::domain::model::{OutputMode, OutputRecord, UnifiedSchema};
use crate::domain::ports::RecordSink;
use crate::utils::error::{EtlError, Result};
use csv::{Writer, WriterBuilder};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const OUTPUT_DELIMITER: u8 = b';';

/// Output path for `input` inside `output_dir`: same stem, mode-specific extension.
pub fn output_path_for(input: &Path, output_dir: &Path, mode: OutputMode) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, mode.file_extension()))
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Semicolon-delimited writer. Header and rows follow the unified schema order.
pub struct DelimitedSink<W: Write> {
    writer: Writer<W>,
    schema: UnifiedSchema,
}

impl DelimitedSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::from_writer(create_file(path)?))
    }
}

impl<W: Write> DelimitedSink<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: WriterBuilder::new()
                .delimiter(OUTPUT_DELIMITER)
                .flexible(false)
                .from_writer(inner),
            schema: UnifiedSchema::default(),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }
}

impl<W: Write + Send> RecordSink for DelimitedSink<W> {
    fn write_header(&mut self, schema: &UnifiedSchema) -> Result<()> {
        self.schema = schema.clone();
        self.writer.write_record(schema.columns())?;
        Ok(())
    }

    fn write_record(&mut self, record: &OutputRecord) -> Result<()> {
        match record {
            OutputRecord::Unified(normalized) => {
                self.writer.write_record(normalized.values_in(&self.schema))?;
                Ok(())
            }
            OutputRecord::Ndjson(_) => Err(EtlError::ConfigError {
                message: "NDJSON record sent to a delimited sink".to_string(),
            }),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One JSON object per line.
pub struct NdjsonSink<W: Write> {
    writer: BufWriter<W>,
}

impl NdjsonSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::from_writer(create_file(path)?))
    }
}

impl<W: Write> NdjsonSink<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }
}

impl<W: Write + Send> RecordSink for NdjsonSink<W> {
    // NDJSON 沒有表頭
    fn write_header(&mut self, _schema: &UnifiedSchema) -> Result<()> {
        Ok(())
    }

    fn write_record(&mut self, record: &OutputRecord) -> Result<()> {
        match record {
            OutputRecord::Ndjson(ndjson) => {
                serde_json::to_writer(&mut self.writer, ndjson)?;
                self.writer.write_all(b"\n")?;
                Ok(())
            }
            OutputRecord::Unified(_) => Err(EtlError::ConfigError {
                message: "unified record sent to an NDJSON sink".to_string(),
            }),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Opens the sink matching `mode` at `path`.
pub fn open_sink(mode: OutputMode, path: &Path) -> Result<Box<dyn RecordSink>> {
    Ok(match mode {
        OutputMode::Unified => Box::new(DelimitedSink::create(path)?),
        OutputMode::Ndjson => Box::new(NdjsonSink::create(path)?),
    })
}
