//! Travel-time oracle for origin/destination matrix lookups
//!
//! Uses Valhalla for production, a haversine estimate for tests and offline
//! runs.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use async_trait::async_trait;

use crate::error::OracleError;
use crate::types::Coordinates;

/// Mean Earth radius in kilometers.
const MEAN_EARTH_RADIUS_KM: f64 = 6371.0088;

/// Travel-time oracle abstraction (Valhalla, haversine estimate, stubs).
///
/// `query` returns an origins-by-destinations matrix of integer minutes in
/// the same order as the inputs. No symmetry or triangle inequality is
/// assumed of the provider.
#[async_trait]
pub trait TravelTimeOracle: Send + Sync {
    async fn query(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
    ) -> Result<Vec<Vec<i64>>, OracleError>;

    /// Oracle name for logging
    fn name(&self) -> &str;
}

/// Great-circle distance between two coordinates in kilometers.
fn great_circle_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let half_dlat = (to.lat - from.lat).to_radians() / 2.0;
    let half_dlng = (to.lng - from.lng).to_radians() / 2.0;

    let a = half_dlat.sin().powi(2)
        + from.lat.to_radians().cos()
            * to.lat.to_radians().cos()
            * half_dlng.sin().powi(2);

    2.0 * MEAN_EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Haversine-estimate oracle for tests and offline planning.
/// Great-circle distance × road coefficient at a fixed average speed.
pub struct HaversineOracle {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 40)
    average_speed_kmh: f64,
}

impl Default for HaversineOracle {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl HaversineOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl TravelTimeOracle for HaversineOracle {
    async fn query(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
    ) -> Result<Vec<Vec<i64>>, OracleError> {
        let mut matrix = vec![vec![0i64; destinations.len()]; origins.len()];

        for (i, from) in origins.iter().enumerate() {
            for (j, to) in destinations.iter().enumerate() {
                let road_km = great_circle_km(from, to) * self.road_coefficient;
                let minutes = road_km / self.average_speed_kmh * 60.0;
                matrix[i][j] = minutes.round() as i64;
            }
        }

        Ok(matrix)
    }

    fn name(&self) -> &str {
        "HaversineEstimate"
    }
}

/// Create an oracle with automatic Valhalla detection and fallback.
///
/// Tries to connect to Valhalla if a URL is provided. Falls back to the
/// haversine estimate if Valhalla is unavailable or not configured.
pub async fn create_oracle_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn TravelTimeOracle> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        let config = ValhallaConfig::new(&url);
        let client = ValhallaClient::new(config);

        match check_valhalla_health(&url).await {
            Ok(()) => {
                info!("Valhalla travel-time oracle available at {}", url);
                return Box::new(client);
            }
            Err(e) => {
                warn!(
                    "Valhalla not available at {}: {}. Falling back to haversine estimate.",
                    url, e
                );
            }
        }
    }

    info!("Using haversine travel-time estimate (Valhalla not configured or unavailable)");
    Box::new(HaversineOracle::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<(), OracleError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url);
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(OracleError::Status {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixture coordinates from the pilot service area around Gurugram

    fn gurugram() -> Coordinates {
        Coordinates { lat: 28.4595, lng: 77.0266 }
    }

    fn delhi() -> Coordinates {
        Coordinates { lat: 28.7041, lng: 77.1025 }
    }

    fn faridabad() -> Coordinates {
        Coordinates { lat: 28.4089, lng: 77.3178 }
    }

    #[test]
    fn test_great_circle_gurugram_delhi() {
        // Straight line between the two city centers is about 28 km
        let km = great_circle_km(&gurugram(), &delhi());
        assert!((km - 28.2).abs() < 2.0, "got {} km", km);
    }

    #[test]
    fn test_great_circle_same_point_is_zero() {
        let km = great_circle_km(&gurugram(), &gurugram());
        assert!(km.abs() < 1e-9);
    }

    #[test]
    fn test_great_circle_symmetry() {
        let there = great_circle_km(&gurugram(), &faridabad());
        let back = great_circle_km(&faridabad(), &gurugram());
        assert!((there - back).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_haversine_oracle_empty_inputs() {
        let oracle = HaversineOracle::new();
        let matrix = oracle.query(&[], &[]).await.unwrap();
        assert!(matrix.is_empty());

        let matrix = oracle.query(&[gurugram()], &[]).await.unwrap();
        assert_eq!(matrix.len(), 1);
        assert!(matrix[0].is_empty());
    }

    #[tokio::test]
    async fn test_haversine_oracle_square_matrix() {
        let oracle = HaversineOracle::new();
        let points = vec![gurugram(), delhi(), faridabad()];
        let matrix = oracle.query(&points, &points).await.unwrap();

        assert_eq!(matrix.len(), 3);
        for row in &matrix {
            assert_eq!(row.len(), 3);
        }

        // Diagonal is zero, off-diagonal positive
        for i in 0..3 {
            assert_eq!(matrix[i][i], 0);
            for j in 0..3 {
                if i != j {
                    assert!(matrix[i][j] > 0);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_haversine_oracle_rectangular_matrix() {
        let oracle = HaversineOracle::new();
        let matrix = oracle
            .query(&[gurugram()], &[delhi(), faridabad()])
            .await
            .unwrap();

        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[0].len(), 2);
    }

    #[tokio::test]
    async fn test_haversine_oracle_minutes_reasonable() {
        let oracle = HaversineOracle::new();
        let matrix = oracle.query(&[gurugram()], &[delhi()]).await.unwrap();

        // ~37 road km at 40 km/h comes out near 55 minutes
        let minutes = matrix[0][0];
        assert!(
            (45..=65).contains(&minutes),
            "Expected ~55 min, got {} min",
            minutes
        );
    }

    #[tokio::test]
    async fn test_haversine_oracle_custom_params_faster() {
        let slow = HaversineOracle::new();
        let fast = HaversineOracle::with_params(1.3, 80.0);

        let a = slow.query(&[gurugram()], &[delhi()]).await.unwrap()[0][0];
        let b = fast.query(&[gurugram()], &[delhi()]).await.unwrap()[0][0];
        assert!(b < a);
    }

    #[test]
    fn test_oracle_name() {
        assert_eq!(HaversineOracle::new().name(), "HaversineEstimate");
    }

    #[tokio::test]
    async fn test_create_oracle_with_fallback_no_url() {
        let oracle = create_oracle_with_fallback(None).await;
        assert_eq!(oracle.name(), "HaversineEstimate");
    }

    #[tokio::test]
    async fn test_create_oracle_with_fallback_invalid_url() {
        // Should fall back when the URL is unreachable
        let oracle =
            create_oracle_with_fallback(Some("http://localhost:1".to_string())).await;
        assert_eq!(oracle.name(), "HaversineEstimate");
    }
}
