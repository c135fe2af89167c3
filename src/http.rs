//! HTTP adapter for a JSON route service.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::preference::{LocationError, LocationRef, TripRequest};
use crate::ranking::{ProviderError, RawCandidate};
use crate::traits::{LocationResolver, MetricsProvider};

#[derive(Debug, Clone)]
pub struct HttpServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

impl HttpServiceConfig {
    pub(crate) fn build_client(&self) -> Result<reqwest::blocking::Client, reqwest::Error> {
        reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRouteService {
    config: HttpServiceConfig,
    client: reqwest::blocking::Client,
}

impl HttpRouteService {
    pub fn new(config: HttpServiceConfig) -> Result<Self, reqwest::Error> {
        let client = config.build_client()?;
        Ok(Self { config, client })
    }
}

impl MetricsProvider for HttpRouteService {
    fn candidates_for(&self, request: &TripRequest) -> Result<Vec<RawCandidate>, ProviderError> {
        let goal = request.goal().to_string();
        let body = self
            .client
            .get(self.config.endpoint("routes"))
            .query(&[
                ("origin", request.origin().id.as_str()),
                ("destination", request.destination().id.as_str()),
                ("goal", goal.as_str()),
                ("avoid_crime", avoid_crime_param(request)),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<RoutesResponse>())?;

        Ok(body.candidates)
    }
}

impl LocationResolver for HttpRouteService {
    fn resolve(&self, text: &str) -> Result<LocationRef, LocationError> {
        let response = self
            .client
            .get(self.config.endpoint("geocode"))
            .query(&[("q", text)])
            .send()
            .map_err(|err| LocationError::Unavailable(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LocationError::NotFound(text.to_string()));
        }

        response
            .error_for_status()
            .and_then(|resp| resp.json::<LocationRef>())
            .map_err(|err| LocationError::Unavailable(err.to_string()))
    }
}

fn avoid_crime_param(request: &TripRequest) -> &'static str {
    if request.avoid_crime_areas() { "true" } else { "false" }
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    candidates: Vec<RawCandidate>,
}
