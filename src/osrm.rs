//! OSRM HTTP adapter for distance matrices.

use std::env;

use serde::Deserialize;

use crate::error::RoutingError;
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Upper bound on locations per `/table` request.
    pub max_locations: usize,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
            max_locations: 10,
        }
    }
}

impl OsrmConfig {
    /// Defaults overridden by `OSRM_BASE_URL`, `OSRM_PROFILE`,
    /// `OSRM_TIMEOUT_SECS` and `OSRM_MAX_LOCATIONS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("OSRM_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(profile) = env::var("OSRM_PROFILE") {
            config.profile = profile;
        }
        if let Some(secs) = env::var("OSRM_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            config.timeout_secs = secs;
        }
        if let Some(max) = env::var("OSRM_MAX_LOCATIONS").ok().and_then(|v| v.parse().ok()) {
            config.max_locations = max;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[(f64, f64)]) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn max_locations(&self) -> usize {
        self.config.max_locations
    }

    fn matrix_for(
        &self,
        locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        if locations.len() > self.config.max_locations {
            return Err(RoutingError::TooManyLocations {
                requested: locations.len(),
                limit: self.config.max_locations,
            });
        }

        let body = self
            .client
            .get(self.table_url(locations))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        body.into_matrix(locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    /// Validates the shape and maps non-finite entries to unreachable.
    fn into_matrix(self, n: usize) -> Result<DistanceMatrix, RoutingError> {
        if self.code != "Ok" {
            return Err(RoutingError::Unavailable(format!(
                "OSRM answered {}: {}",
                self.code,
                self.message.unwrap_or_default()
            )));
        }

        let rows = self
            .distances
            .ok_or_else(|| RoutingError::MalformedResponse("missing distances".to_string()))?;
        if rows.len() != n {
            return Err(RoutingError::MalformedResponse(format!(
                "expected {} rows, got {}",
                n,
                rows.len()
            )));
        }

        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.resize(n, None);
                row.into_iter()
                    .map(|value| value.filter(|d| d.is_finite()))
                    .collect()
            })
            .collect())
    }
}
