use crate::core::address::{LATITUDE_COLUMN, LONGITUDE_COLUMN};
use crate::core::pipeline::{Enrichment, StreamPipeline};
use crate::adapters::sink::output_path_for;
use crate::core::schema::collect_unified_schema;
use crate::core::sniffer::detect_file_format;
use crate::core::transformer::RowTransformer;
use crate::domain::model::{
    FileMetrics, FileOutcome, FileStage, OutputMode, RunMetrics, UnifiedSchema,
};
use crate::domain::ports::{ConfigProvider, Geocoder};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::ResourceMonitor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

/// Regular files in `dir` whose extension is in `extensions` (case-insensitive), sorted by name.
pub fn discover_input_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| EtlError::InputDirectoryError {
        path: dir.to_path_buf(),
        source,
    })?;

    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| EtlError::InputDirectoryError {
                path: dir.to_path_buf(),
                source,
            })?
            .path();

        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| wanted.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false);

        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs every input file through its own [`StreamPipeline`], one file at a time.
pub struct BatchRunner<C: ConfigProvider> {
    config: C,
    geocoder: Option<Box<dyn Geocoder>>,
    monitor: ResourceMonitor,
}

impl<C: ConfigProvider> BatchRunner<C> {
    pub fn new(config: C) -> Self {
        Self {
            config,
            geocoder: None,
            monitor: ResourceMonitor::default(),
        }
    }

    pub fn new_with_monitoring(config: C, monitor_enabled: bool) -> Self {
        Self {
            monitor: ResourceMonitor::new(monitor_enabled),
            ..Self::new(config)
        }
    }

    pub fn with_geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    fn build_schema(&self, files: &[PathBuf]) -> UnifiedSchema {
        let schema = match self.config.output_mode() {
            OutputMode::Unified => collect_unified_schema(files),
            OutputMode::Ndjson => UnifiedSchema::default(),
        };

        if self.geocoder.is_some() && self.config.output_mode() == OutputMode::Unified {
            schema.with_columns(&[LATITUDE_COLUMN, LONGITUDE_COLUMN])
        } else {
            schema
        }
    }

    /// Fails only when the input directory cannot be listed; file failures land in the metrics.
    pub async fn run(&self) -> Result<RunMetrics> {
        let started = Instant::now();
        let input_dir = Path::new(self.config.input_dir());
        let output_dir = Path::new(self.config.output_dir());

        tracing::info!(
            "🚀 Starting batch: {} -> {} ({:?} mode)",
            input_dir.display(),
            output_dir.display(),
            self.config.output_mode()
        );
        self.monitor.log_phase("Start");

        let files = discover_input_files(input_dir, self.config.input_extensions())?;
        if files.is_empty() {
            tracing::warn!("⚠️ No input files found in {}", input_dir.display());
        } else {
            tracing::info!("🔎 Found {} input file(s)", files.len());
        }

        let schema = self.build_schema(&files);
        self.monitor.log_phase("Schema");

        let transformer = RowTransformer::new(self.config.output_mode(), schema);
        let locality = self.config.geocoding().and_then(|g| g.locality);
        let mut pipeline = StreamPipeline::new(&transformer, output_dir);
        if let Some(geocoder) = &self.geocoder {
            pipeline = pipeline.with_enrichment(Enrichment {
                geocoder: &**geocoder,
                locality: locality.as_deref(),
            });
        }

        let mut run = RunMetrics {
            schema_columns: transformer.schema().len(),
            ..RunMetrics::default()
        };

        // 不同副檔名的同名檔 (a.csv / a.tsv) 會對應到同一個輸出檔
        let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
        for file in &files {
            let output = output_path_for(file, output_dir, self.config.output_mode());
            if let Some(first) = claimed.get(&output) {
                let outcome = output_taken(file, output, first);
                run.record(&outcome);
                continue;
            }
            claimed.insert(output, file);

            let outcome = pipeline.process_file(file).await;
            run.record(&outcome);
        }

        run.elapsed = started.elapsed();
        self.monitor.log_phase("Done");
        log_summary(&run);
        Ok(run)
    }
}

fn output_taken(file: &Path, output: PathBuf, first: &Path) -> FileOutcome {
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let err = EtlError::OutputConflictError {
        path: output,
        message: format!("already written from {}", first.display()),
    };
    tracing::error!("❌ {} skipped: {}", file.display(), err);

    FileOutcome::Failed {
        metrics: FileMetrics::new(file.to_path_buf(), detect_file_format(&file_name)),
        stage: FileStage::Start,
        reason: err.to_string(),
    }
}

pub fn log_summary(run: &RunMetrics) {
    tracing::info!(
        "📊 Summary: {} file(s), {} succeeded, {} row(s) read, {} written, {} error(s), {} column(s)",
        run.files_total,
        run.files_succeeded,
        run.rows_read,
        run.rows_written,
        run.rows_failed,
        run.schema_columns
    );
    tracing::info!(
        "⏱️ Total time {:?}, row time {:?}, avg per row {:?}",
        run.elapsed,
        run.row_time,
        run.average_row_time()
    );
    for (file, reason) in &run.failed_files {
        tracing::error!("❌ Failed file {}: {}", file.display(), reason);
    }
}
