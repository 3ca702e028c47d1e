use crate::domain::model::Coordinates;
use crate::domain::ports::{Geocoder, GeocodingSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Client for a Google-Geocoding-compatible endpoint (`?address=..&key=..`).
/// One attempt per address, no retries.
pub struct HttpGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(settings: &GeocodingSettings) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    async fn lookup(&self, address: &str) -> Result<Coordinates, String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {}", e))?;

        match body.results.first() {
            Some(result) => Ok(Coordinates::new(
                result.geometry.location.lat,
                result.geometry.location.lng,
            )),
            None => Err(format!("no results (status {})", body.status)),
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Coordinates {
        match self.lookup(address).await {
            Ok(coordinates) => {
                tracing::debug!("📍 {} -> {:?}", address, coordinates);
                coordinates
            }
            Err(reason) => {
                tracing::warn!("⚠️ Could not geocode {:?}: {}", address, reason);
                Coordinates::unresolved()
            }
        }
    }
}
