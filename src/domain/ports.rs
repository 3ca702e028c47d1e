use crate::domain::model::{Coordinates, OutputMode, OutputRecord, UnifiedSchema};
use crate::utils::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodingSettings {
    pub endpoint: String,
    pub api_key: String,
    /// Appended to every search string, e.g. "Recife, PE".
    pub locality: Option<String>,
}

pub trait ConfigProvider: Send + Sync {
    fn input_dir(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn output_mode(&self) -> OutputMode;
    fn input_extensions(&self) -> &[String];
    fn geocoding(&self) -> Option<GeocodingSettings>;
}

/// Resolves a free-text address. Never fails: any problem yields unresolved coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Coordinates;
}

/// Incremental output of one file. Each record is persisted before the next row is read.
pub trait RecordSink: Send {
    fn write_header(&mut self, schema: &UnifiedSchema) -> Result<()>;
    fn write_record(&mut self, record: &OutputRecord) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
