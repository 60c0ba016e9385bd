//! Customer order entity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coordinates::Coordinates;
use super::skill::{Skill, SkillSet};
use super::technician::Gender;

/// A home-visit order: one customer address, one or more requested services.
///
/// All times are integer minutes since midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub coordinates: Coordinates,
    /// Requested service start; the customer accepts a start up to
    /// [`Order::WINDOW_MINUTES`] later.
    pub requested_start_min: i64,
    /// Total on-site minutes over all requested services.
    pub service_minutes: i64,
    /// Carrying-capacity units consumed (one per requested service).
    pub demand: i64,
    /// Total revenue over all requested services.
    pub revenue: i64,
    pub required_skills: SkillSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_gender: Option<Gender>,
}

impl Order {
    /// Width of the acceptance window after the requested start.
    pub const WINDOW_MINUTES: i64 = 60;

    /// Build an order from its requested service categories, deriving
    /// duration, price, and demand from the per-skill tables.
    pub fn from_services(
        id: Uuid,
        coordinates: Coordinates,
        requested_start_min: i64,
        services: &[Skill],
    ) -> Self {
        Self {
            id,
            coordinates,
            requested_start_min,
            service_minutes: services.iter().map(|s| s.service_minutes()).sum(),
            demand: services.len() as i64,
            revenue: services.iter().map(|s| s.price()).sum(),
            required_skills: services.iter().copied().collect(),
            preferred_gender: None,
        }
    }

    pub fn latest_start_min(&self) -> i64 {
        self.requested_start_min + Self::WINDOW_MINUTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_services_derives_totals() {
        let order = Order::from_services(
            Uuid::new_v4(),
            Coordinates::new(28.4, 77.0),
            420,
            &[Skill::Regular, Skill::Special],
        );
        assert_eq!(order.service_minutes, 30);
        assert_eq!(order.demand, 2);
        assert_eq!(order.revenue, 600);
        assert!(order.required_skills.contains(&Skill::Special));
        assert_eq!(order.latest_start_min(), 480);
    }

    #[test]
    fn test_deserialize_without_gender_preference() {
        let json = format!(
            r#"{{
                "id": "{}",
                "coordinates": {{"lat": 28.4, "lng": 77.0}},
                "requestedStartMin": 540,
                "serviceMinutes": 15,
                "demand": 1,
                "revenue": 200,
                "requiredSkills": ["regular"]
            }}"#,
            Uuid::new_v4()
        );
        let order: Order = serde_json::from_str(&json).unwrap();
        assert!(order.preferred_gender.is_none());
        assert_eq!(order.requested_start_min, 540);
    }
}
