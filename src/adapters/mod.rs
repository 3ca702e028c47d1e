// Adapters layer: concrete implementations of the domain ports (output files, geocoding HTTP).

pub mod geocoding;
pub mod sink;
