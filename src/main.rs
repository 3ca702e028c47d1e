use clap::Parser;
use traffic_etl::domain::ports::ConfigProvider;
use traffic_etl::utils::error::ErrorSeverity;
use traffic_etl::utils::{logger, validation::Validate};
use traffic_etl::{BatchRunner, CliConfig, EtlError, HttpGeocoder, RunMetrics, TomlConfig};

async fn run_batch<C: ConfigProvider>(
    config: C,
    monitor: bool,
) -> Result<RunMetrics, EtlError> {
    let geocoding = config.geocoding();
    let mut runner = BatchRunner::new_with_monitoring(config, monitor);

    if let Some(settings) = geocoding {
        tracing::info!("📍 Geocoding enabled via {}", settings.endpoint);
        runner = runner.with_geocoder(Box::new(HttpGeocoder::new(&settings)));
    }

    runner.run().await
}

fn exit_for(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 有指定 TOML 就以檔案設定為主
    let toml = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let verbose = cli.verbose || toml.as_ref().map(TomlConfig::verbose).unwrap_or(false);
    if cli.json_logs || toml.as_ref().map(TomlConfig::json_logs).unwrap_or(false) {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting traffic-etl");

    let validation = match &toml {
        Some(config) => config.validate(),
        None => cli.validate(),
    };
    if let Err(e) = validation {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_for(&e);
    }

    let result = match toml {
        Some(config) => {
            let monitor = cli.monitor || config.monitoring_enabled();
            run_batch(config, monitor).await
        }
        None => {
            let monitor = cli.monitor;
            run_batch(cli, monitor).await
        }
    };

    match result {
        Ok(run) => {
            println!(
                "✅ {} file(s), {} row(s) written, {} row error(s), {} failed file(s) in {:?}",
                run.files_total,
                run.rows_written,
                run.rows_failed,
                run.failed_files.len(),
                run.elapsed
            );
            for (file, reason) in &run.failed_files {
                println!("   ❌ {}: {}", file.display(), reason);
            }
            Ok(())
        }
        Err(e) => exit_for(&e),
    }
}
