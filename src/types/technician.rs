//! Mobile technician (phlebotomist) entity

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::coordinates::Coordinates;
use super::skill::{Skill, SkillSet};

/// Technician gender, matched against an order's optional preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// A mobile technician with a daily shift anchored at their home address.
///
/// The expertise set is closed under the skill implication chain at
/// ingestion; downstream consumers never re-expand it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: Uuid,
    pub home: Coordinates,
    pub shift_start_min: i64,
    pub shift_end_min: i64,
    /// Lower bound of the end-of-day catchment arrival window.
    pub break_start_min: i64,
    pub capacity: i64,
    /// Hiring cost per shift.
    pub cost: i64,
    /// Customer service rating, 0.0 to 5.0.
    pub service_rating: f64,
    #[serde(deserialize_with = "expanded_skill_set")]
    pub expertise: SkillSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

fn expanded_skill_set<'de, D>(deserializer: D) -> Result<SkillSet, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = SkillSet::deserialize(deserializer)?;
    Ok(Skill::expand(raw))
}

impl Technician {
    /// Shift length in minutes.
    pub const SHIFT_MINUTES: i64 = 480;
    /// Break starts this many minutes into the shift.
    pub const BREAK_OFFSET_MINUTES: i64 = 240;
    /// Default single-trip carrying capacity.
    pub const DEFAULT_CAPACITY: i64 = 20;

    /// Build a technician from their top expertise category, deriving shift
    /// end, break start, cost, and capacity from the defaults.
    pub fn from_top_skill(
        id: Uuid,
        home: Coordinates,
        shift_start_min: i64,
        top: Skill,
        service_rating: f64,
    ) -> Self {
        Self {
            id,
            home,
            shift_start_min,
            shift_end_min: shift_start_min + Self::SHIFT_MINUTES,
            break_start_min: shift_start_min + Self::BREAK_OFFSET_MINUTES,
            capacity: Self::DEFAULT_CAPACITY,
            cost: top.base_cost(),
            service_rating,
            expertise: Skill::expand([top]),
            gender: None,
        }
    }

    /// Integer weight driving the time-span cost of this technician's route:
    /// cheaper and better-rated technicians get a lower coefficient, so the
    /// solver prefers loading work onto them.
    pub fn span_cost_coefficient(&self) -> i64 {
        if self.service_rating > 0.0 {
            (self.cost as f64 / self.service_rating).round() as i64
        } else {
            self.cost
        }
    }
}
