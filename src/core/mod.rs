pub mod address;
pub mod batch;
pub mod headers;
pub mod normalizers;
pub mod pipeline;
pub mod schema;
pub mod sniffer;
pub mod transformer;

pub use crate::domain::model::{NormalizedRecord, RawRow, UnifiedSchema};
pub use crate::domain::ports::{ConfigProvider, Geocoder, RecordSink};
pub use crate::utils::error::Result;
