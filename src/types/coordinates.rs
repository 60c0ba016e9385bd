//! Geographic coordinates

use serde::{Deserialize, Serialize};

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// A coordinate is usable only when both components are finite and within
    /// WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(Coordinates::new(28.4595, 77.0266).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_serde_camel_case() {
        let c = Coordinates::new(28.46, 77.03);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"lat\""));
        assert!(json.contains("\"lng\""));
        let back: Coordinates = serde_json::from_str(&json).unwrap();
        assert!((back.lat - 28.46).abs() < f64::EPSILON);
    }
}
