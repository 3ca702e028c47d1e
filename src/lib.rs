pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::geocoding::HttpGeocoder;
pub use config::{toml_config::TomlConfig, CliConfig};
pub use crate::core::batch::BatchRunner;
pub use domain::model::{OutputMode, RunMetrics, UnifiedSchema};
pub use utils::error::{EtlError, Result};
