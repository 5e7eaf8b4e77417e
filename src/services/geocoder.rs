use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;

use crate::model::GeoPoint;

#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoPoint>;
}

/// MapQuest geocoding API client.
#[derive(Debug, Clone)]
pub struct MapQuestGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MapQuestGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bootcamp-directory/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build geocoder HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    locations: Vec<GeocodeLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeocodeLocation {
    lat_lng: LatLng,
    street: Option<String>,
    #[serde(rename = "adminArea5")]
    city: Option<String>,
    #[serde(rename = "adminArea3")]
    state: Option<String>,
    postal_code: Option<String>,
    #[serde(rename = "adminArea1")]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<GeocodeLocation> for GeoPoint {
    fn from(location: GeocodeLocation) -> Self {
        let street = non_empty(location.street);
        let city = non_empty(location.city);
        let state = non_empty(location.state);
        let zipcode = non_empty(location.postal_code);
        let country = non_empty(location.country);

        let mut formatted = Vec::new();
        formatted.extend(street.clone());
        formatted.extend(city.clone());
        formatted.extend(
            [state.clone(), zipcode.clone()]
                .into_iter()
                .flatten()
                .reduce(|a, b| format!("{} {}", a, b)),
        );
        formatted.extend(country.clone());

        GeoPoint {
            latitude: location.lat_lng.lat,
            longitude: location.lat_lng.lng,
            formatted_address: (!formatted.is_empty()).then(|| formatted.join(", ")),
            street,
            city,
            state,
            zipcode,
            country,
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoPoint> {
        let url = format!("{}/geocoding/v1/address", self.base_url);
        log::debug!("Geocoding '{}'", address);

        let response: GeocodeResponse = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("location", address)])
            .send()
            .await
            .context("Geocoding request failed")?
            .error_for_status()
            .context("Geocoder returned an error status")?
            .json()
            .await
            .context("Failed to parse geocoder response")?;

        response
            .results
            .into_iter()
            .next()
            .and_then(|result| result.locations.into_iter().next())
            .map(GeoPoint::from)
            .ok_or_else(|| anyhow!("No geocoding result for '{}'", address))
    }
}

/// Fixed lookup table. Used when no provider is configured and in tests.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    points: RwLock<HashMap<String, GeoPoint>>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, point: GeoPoint) -> Self {
        self.insert(address, point);
        self
    }

    pub fn insert(&self, address: &str, point: GeoPoint) {
        self.points.write().insert(normalize(address), point);
    }
}

fn normalize(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[async_trait::async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoPoint> {
        self.points
            .read()
            .get(&normalize(address))
            .cloned()
            .ok_or_else(|| anyhow!("No geocoding result for '{}'", address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_response() {
        let body = serde_json::json!({
            "results": [{
                "locations": [{
                    "latLng": { "lat": 42.350504, "lng": -71.105399 },
                    "street": "233 Bay State Rd",
                    "adminArea5": "Boston",
                    "adminArea3": "MA",
                    "postalCode": "02215-1405",
                    "adminArea1": "US"
                }]
            }]
        });
        let response: GeocodeResponse = serde_json::from_value(body).unwrap();
        let location = response.results.into_iter().next().unwrap().locations.into_iter().next().unwrap();
        let point = GeoPoint::from(location);

        assert_eq!(point.latitude, 42.350504);
        assert_eq!(point.city.as_deref(), Some("Boston"));
        assert_eq!(point.zipcode.as_deref(), Some("02215-1405"));
        assert_eq!(
            point.formatted_address.as_deref(),
            Some("233 Bay State Rd, Boston, MA 02215-1405, US")
        );
    }

    #[test]
    fn test_empty_components_are_dropped() {
        let location: GeocodeLocation = serde_json::from_value(serde_json::json!({
            "latLng": { "lat": 1.0, "lng": 2.0 },
            "street": "",
            "adminArea5": "Lowell"
        }))
        .unwrap();
        let point = GeoPoint::from(location);
        assert_eq!(point.street, None);
        assert_eq!(point.formatted_address.as_deref(), Some("Lowell"));
    }

    #[tokio::test]
    async fn test_static_geocoder_normalizes_addresses() {
        let geocoder = StaticGeocoder::new().with("02118", GeoPoint::new(42.34, -71.07));
        assert_eq!(geocoder.geocode(" 02118 ").await.unwrap().latitude, 42.34);
        assert!(geocoder.geocode("99999").await.is_err());
    }
}
