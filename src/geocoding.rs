#![cfg(feature = "web")]
//! Geocoding client: forward, reverse and autocomplete lookups

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeocodingConfig;
use crate::error::{NackError, Result};
use crate::models::GeoPoint;

/// Searches are restricted to Gabon
const COUNTRY_FILTER: &str = "countrycode:ga";

/// Address suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub label: String,
    pub location: GeoPoint,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    lat: f64,
    lon: f64,
    #[serde(default)]
    formatted: Option<String>,
    #[serde(default)]
    address_line1: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

impl From<RawPlace> for Place {
    fn from(raw: RawPlace) -> Self {
        let label = raw
            .formatted
            .or(raw.address_line1)
            .unwrap_or_else(|| format!("{:.5}, {:.5}", raw.lat, raw.lon));
        Place {
            label,
            location: GeoPoint {
                lat: raw.lat,
                lon: raw.lon,
            },
            city: raw.city,
        }
    }
}

#[derive(Clone)]
pub struct Geocoder {
    client: Client,
    config: GeocodingConfig,
}

impl Geocoder {
    pub fn new(client: Client, config: GeocodingConfig) -> Self {
        Self { client, config }
    }

    async fn lookup(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<Place>> {
        if self.config.api_key.is_empty() {
            return Err(NackError::Upstream("geocoding is not configured".to_string()));
        }

        let response = self
            .client
            .get(format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                endpoint
            ))
            .query(params)
            .query(&[("format", "json"), ("apiKey", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NackError::Upstream(format!("geocoder returned {}", status)));
        }

        let body: GeocodeResponse = response.json().await?;
        Ok(body.results.into_iter().map(Place::from).collect())
    }

    /// Places matching a free-text address
    pub async fn forward(&self, text: &str) -> Result<Vec<Place>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NackError::invalid("address is empty"));
        }
        self.lookup(
            "search",
            &[("text", text.to_string()), ("filter", COUNTRY_FILTER.to_string())],
        )
        .await
    }

    /// Closest address to a point, if any
    pub async fn reverse(&self, point: &GeoPoint) -> Result<Option<Place>> {
        if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
            return Err(NackError::invalid("coordinates out of range"));
        }
        let places = self
            .lookup(
                "reverse",
                &[("lat", point.lat.to_string()), ("lon", point.lon.to_string())],
            )
            .await?;
        Ok(places.into_iter().next())
    }

    /// Suggestions while the address is being typed
    pub async fn autocomplete(&self, partial: &str, limit: usize) -> Result<Vec<Place>> {
        let partial = partial.trim();
        if partial.chars().count() < 3 {
            return Ok(Vec::new());
        }
        self.lookup(
            "autocomplete",
            &[
                ("text", partial.to_string()),
                ("filter", COUNTRY_FILTER.to_string()),
                ("limit", limit.clamp(1, 10).to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_places_get_a_label() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{"results":[
                {"lat":0.39,"lon":9.45,"formatted":"Boulevard Triomphal, Libreville","city":"Libreville"},
                {"lat":-0.71,"lon":8.78}
            ]}"#,
        )
        .unwrap();
        let places: Vec<Place> = body.results.into_iter().map(Place::from).collect();
        assert_eq!(places[0].label, "Boulevard Triomphal, Libreville");
        assert_eq!(places[0].city.as_deref(), Some("Libreville"));
        assert_eq!(places[1].label, "-0.71000, 8.78000");
    }

    #[tokio::test]
    async fn short_input_needs_no_request() {
        let geocoder = Geocoder::new(Client::new(), crate::config::Config::default().geocoding);
        assert!(geocoder.autocomplete("Li", 5).await.unwrap().is_empty());
        assert!(geocoder.forward("  ").await.is_err());
        assert!(
            geocoder
                .reverse(&GeoPoint { lat: 91.0, lon: 0.0 })
                .await
                .is_err()
        );
    }
}
