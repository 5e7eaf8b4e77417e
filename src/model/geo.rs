use serde::{Deserialize, Serialize};

/// Mean Earth radius in miles, used to turn a search distance into radians.
pub const EARTH_RADIUS_MILES: f64 = 3963.0;

/// Result of a geocoding lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            formatted_address: None,
            street: None,
            city: None,
            state: None,
            zipcode: None,
            country: None,
        }
    }
}

/// GeoJSON point with the address components it was geocoded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`, GeoJSON order.
    pub coordinates: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl From<GeoPoint> for Location {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
            formatted_address: point.formatted_address,
            street: point.street,
            city: point.city,
            state: point.state,
            zipcode: point.zipcode,
            country: point.country,
        }
    }
}

/// Great-circle distance between two points, in radians of arc.
pub fn angular_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

pub fn miles_to_radians(distance: f64) -> f64 {
    distance / EARTH_RADIUS_MILES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angular_distance_boston_to_providence() {
        // Roughly 41 miles apart
        let radians = angular_distance(42.3601, -71.0589, 41.8240, -71.4128);
        let miles = radians * EARTH_RADIUS_MILES;
        assert!((miles - 41.0).abs() < 2.0, "got {miles}");
    }

    #[test]
    fn test_location_from_point_uses_geojson_order() {
        let location = Location::from(GeoPoint::new(42.0, -71.0));
        assert_eq!(location.kind, "Point");
        assert_eq!(location.coordinates, [-71.0, 42.0]);
    }
}
