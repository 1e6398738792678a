use crate::{
    config::GeocodingConfig,
    error::{ExchangeError, Result},
    model::Place,
    ports::Geocoder,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub place_id: String,
    pub formatted_address: String,
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

pub struct HttpGeocoder {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.unwrap_or(10)))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve_place(&self, address_or_place_id: &str) -> Result<Place> {
        let mut request = self
            .client
            .get(format!("{}/geocode/json", self.endpoint))
            .query(&[("address", address_or_place_id)]);

        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request.send().await?.error_for_status()?;
        let body: GeocodeResponse = response.json().await?;

        tracing::debug!(query = %address_or_place_id, status = %body.status, "Geocode response");
        place_from_response(body, address_or_place_id)
    }
}

pub fn place_from_response(response: GeocodeResponse, query: &str) -> Result<Place> {
    if response.status != "OK" {
        return Err(ExchangeError::PlaceNotFound(format!("{} ({})", query, response.status)));
    }

    response
        .results
        .into_iter()
        .next()
        .map(|r| Place {
            place_id: r.place_id,
            formatted_address: r.formatted_address,
            lat: r.geometry.location.lat,
            lng: r.geometry.location.lng,
        })
        .ok_or_else(|| ExchangeError::PlaceNotFound(query.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_result_wins() {
        let response: GeocodeResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "results": [
                    {"place_id": "abc", "formatted_address": "123 Main St, City", "geometry": {"location": {"lat": 1.5, "lng": 2.5}}},
                    {"place_id": "def", "formatted_address": "123 Main Rd", "geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
                ]
            }"#,
        )
        .unwrap();

        let place = place_from_response(response, "123 Main St").unwrap();
        assert_eq!(place.encode(), "abc//123 Main St, City");
        assert_eq!(place.lat, 1.5);
    }

    #[test]
    fn test_zero_results_is_not_found() {
        let response: GeocodeResponse = serde_json::from_str(r#"{"status": "ZERO_RESULTS"}"#).unwrap();
        assert!(matches!(
            place_from_response(response, "nowhere"),
            Err(ExchangeError::PlaceNotFound(_))
        ));

        let empty = GeocodeResponse { status: "OK".to_string(), results: vec![] };
        assert!(matches!(place_from_response(empty, "nowhere"), Err(ExchangeError::PlaceNotFound(_))));
    }

    #[test]
    fn test_endpoint_normalized() {
        let config = GeocodingConfig {
            endpoint: "https://maps.example.com/api/".to_string(),
            api_key: None,
            timeout_seconds: None,
        };
        let geocoder = HttpGeocoder::new(&config).unwrap();
        assert_eq!(geocoder.endpoint, "https://maps.example.com/api");
    }
}
