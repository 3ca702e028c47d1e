pub mod toml_config;

use crate::core::batch::DEFAULT_EXTENSIONS;
use crate::domain::model::OutputMode;
use crate::domain::ports::{ConfigProvider, GeocodingSettings};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_extensions, validate_non_empty_string, validate_path, validate_required_field,
    validate_url, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GEOCODING_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "traffic-etl"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Normalize traffic-incident CSV/TSV files into one schema or NDJSON")
)]
pub struct CliConfig {
    /// Directory holding the raw CSV/TSV/TXT files
    #[cfg_attr(feature = "cli", arg(long, default_value = "./input"))]
    pub input_dir: String,

    /// Directory receiving one output file per input file
    #[cfg_attr(feature = "cli", arg(long, default_value = "./output"))]
    pub output_dir: String,

    #[cfg_attr(feature = "cli", arg(long, value_enum, default_value = "unified"))]
    pub mode: OutputMode,

    #[cfg_attr(
        feature = "cli",
        arg(long, value_delimiter = ',', default_value = "csv,tsv,txt")
    )]
    pub extensions: Vec<String>,

    /// Add latitude/longitude resolved from the address columns
    #[cfg_attr(feature = "cli", arg(long))]
    pub geocode: bool,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_GEOCODING_ENDPOINT))]
    pub geocoding_endpoint: String,

    #[cfg_attr(feature = "cli", arg(long, env = "GEOCODING_API_KEY", hide_env_values = true))]
    pub geocoding_api_key: Option<String>,

    /// Appended to every geocoding query, e.g. "Recife, PE"
    #[cfg_attr(feature = "cli", arg(long))]
    pub locality: Option<String>,

    /// Load settings from a TOML file instead of the flags above
    #[cfg_attr(feature = "cli", arg(long))]
    pub config: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Emit JSON log lines"))]
    pub json_logs: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Log CPU and memory per phase"))]
    pub monitor: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            input_dir: "./input".to_string(),
            output_dir: "./output".to_string(),
            mode: OutputMode::Unified,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            geocode: false,
            geocoding_endpoint: DEFAULT_GEOCODING_ENDPOINT.to_string(),
            geocoding_api_key: None,
            locality: None,
            config: None,
            verbose: false,
            json_logs: false,
            monitor: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn input_dir(&self) -> &str {
        &self.input_dir
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn input_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn geocoding(&self) -> Option<GeocodingSettings> {
        if !self.geocode {
            return None;
        }
        Some(GeocodingSettings {
            endpoint: self.geocoding_endpoint.clone(),
            api_key: self.geocoding_api_key.clone().unwrap_or_default(),
            locality: self.locality.clone(),
        })
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input_dir", &self.input_dir)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_extensions("extensions", &self.extensions, &DEFAULT_EXTENSIONS)?;

        if self.geocode {
            validate_url("geocoding_endpoint", &self.geocoding_endpoint)?;
            let key = validate_required_field("geocoding_api_key", &self.geocoding_api_key)?;
            validate_non_empty_string("geocoding_api_key", key)?;
        }

        Ok(())
    }
}
