//! Valhalla travel-time matrix client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TravelTimeOracle;
use crate::error::OracleError;
use crate::types::Coordinates;

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds; doubles as the oracle-call deadline
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Valhalla matrix client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Build the sources_to_targets request
    fn build_matrix_request(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
    ) -> MatrixRequest {
        let to_locations = |coords: &[Coordinates]| {
            coords
                .iter()
                .map(|c| ValhallaLocation {
                    lat: c.lat,
                    lon: c.lng,
                    // 500m radius – sufficient for geocoded coordinates that
                    // may be slightly off-road (building centroid vs road edge)
                    radius: Some(500),
                })
                .collect::<Vec<_>>()
        };

        MatrixRequest {
            sources: to_locations(origins),
            targets: to_locations(destinations),
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }
}

#[async_trait]
impl TravelTimeOracle for ValhallaClient {
    async fn query(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
    ) -> Result<Vec<Vec<i64>>, OracleError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(vec![vec![]; origins.len()]);
        }

        let request = self.build_matrix_request(origins, destinations);
        let url = format!("{}/sources_to_targets", self.config.base_url);

        debug!(
            "Requesting {}x{} travel-time matrix from Valhalla",
            origins.len(),
            destinations.len()
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        if matrix_response.sources_to_targets.len() != origins.len() {
            return Err(OracleError::Malformed(format!(
                "expected {} rows, got {}",
                origins.len(),
                matrix_response.sources_to_targets.len()
            )));
        }

        let mut minutes = vec![vec![0i64; destinations.len()]; origins.len()];
        for (i, row) in matrix_response.sources_to_targets.iter().enumerate() {
            if row.len() != destinations.len() {
                return Err(OracleError::Malformed(format!(
                    "expected {} columns in row {}, got {}",
                    destinations.len(),
                    i,
                    row.len()
                )));
            }
            for (j, cell) in row.iter().enumerate() {
                minutes[i][j] = match cell.time {
                    Some(seconds) => (seconds / 60.0).round() as i64,
                    None => {
                        warn!("No duration for route {} -> {}", i, j);
                        i64::MAX / 4
                    }
                };
            }
        }

        debug!(
            "Received travel-time matrix from Valhalla: {}x{}",
            origins.len(),
            destinations.len()
        );

        Ok(minutes)
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Time in seconds
    time: Option<f64>,
}
