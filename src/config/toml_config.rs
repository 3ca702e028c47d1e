use crate::config::DEFAULT_GEOCODING_ENDPOINT;
use crate::core::batch::DEFAULT_EXTENSIONS;
use crate::domain::model::OutputMode;
use crate::domain::ports::{ConfigProvider, GeocodingSettings};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_extensions, validate_non_empty_string, validate_path, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static placeholder pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub geocoding: Option<GeocodingConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub dir: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
    #[serde(default)]
    pub mode: OutputMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    pub locality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_GEOCODING_ENDPOINT.to_string()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEOCODING_API_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .map(|level| level.eq_ignore_ascii_case("debug") || level.eq_ignore_ascii_case("trace"))
            .unwrap_or(false)
    }

    fn active_geocoding(&self) -> Option<&GeocodingConfig> {
        self.geocoding.as_ref().filter(|g| g.enabled)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_dir(&self) -> &str {
        &self.input.dir
    }

    fn output_dir(&self) -> &str {
        &self.output.dir
    }

    fn output_mode(&self) -> OutputMode {
        self.output.mode
    }

    fn input_extensions(&self) -> &[String] {
        &self.input.extensions
    }

    fn geocoding(&self) -> Option<GeocodingSettings> {
        self.active_geocoding().map(|g| GeocodingSettings {
            endpoint: g.endpoint.clone(),
            api_key: g.api_key.clone(),
            locality: g.locality.clone(),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input.dir", &self.input.dir)?;
        validate_path("output.dir", &self.output.dir)?;
        validate_extensions("input.extensions", &self.input.extensions, &DEFAULT_EXTENSIONS)?;

        if let Some(geocoding) = self.active_geocoding() {
            validate_url("geocoding.endpoint", &geocoding.endpoint)?;
            validate_non_empty_string("geocoding.api_key", &geocoding.api_key)?;
            if geocoding.api_key.starts_with("${") {
                return Err(EtlError::ConfigValidationError {
                    field: "geocoding.api_key".to_string(),
                    message: format!("environment variable {} is not set", geocoding.api_key),
                });
            }
        }

        Ok(())
    }
}
