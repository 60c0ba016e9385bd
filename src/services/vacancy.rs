//! Slack-insertion query ("reverse vacancy")
//!
//! Given an already-computed plan and a prospective order, enumerate the
//! route gaps where the order could slot in without disturbing the committed
//! visits. Candidates only: the query deliberately ignores carrying capacity
//! and downstream wait propagation, leaving the final word to a dispatcher.

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::error::{EngineError, OracleError};
use crate::services::routing::TravelTimeOracle;
use crate::types::{Coordinates, Plan, Skill, SkillSet};

/// One feasible insertion slot.
#[derive(Debug, Clone, Serialize)]
pub struct VacancySlot {
    pub phlebotomist_index: usize,
    /// Detour travel: previous stop to the new order plus new order to the
    /// next stop.
    pub total_travel_time: i64,
    /// Proposed customer-facing window, in whole hours since midnight.
    pub time_window_start: i64,
    pub time_window_end: i64,
    pub from_loc_idx: usize,
    pub to_loc_idx: usize,
    pub from_coordinates: Coordinates,
    pub to_coordinates: Coordinates,
}

/// Feasible slots sorted by detour travel time, ascending.
#[derive(Debug, Clone, Serialize)]
pub struct VacancyTable {
    pub rows: Vec<VacancySlot>,
}

impl VacancyTable {
    /// Column-oriented JSON with the external column names: each column maps
    /// row index (as a string) to the cell value.
    pub fn to_column_json(&self) -> serde_json::Value {
        let column = |f: &dyn Fn(&VacancySlot) -> serde_json::Value| {
            self.rows
                .iter()
                .enumerate()
                .map(|(i, row)| (i.to_string(), f(row)))
                .collect::<serde_json::Map<_, _>>()
        };

        json!({
            "PhlebotomistIndex": column(&|r| json!(r.phlebotomist_index)),
            "TotalTravelTime": column(&|r| json!(r.total_travel_time)),
            "TimeWindowStart": column(&|r| json!(r.time_window_start)),
            "TimeWindowEnd": column(&|r| json!(r.time_window_end)),
            "FromLocIdx": column(&|r| json!(r.from_loc_idx)),
            "ToLocIdx": column(&|r| json!(r.to_loc_idx)),
            "FromLocCoordinates": column(&|r| json!(r.from_coordinates)),
            "ToLocCoordinates": column(&|r| json!(r.to_coordinates)),
        })
    }
}

/// Enumerate feasible insertion positions for a prospective order across all
/// technicians of a plan.
pub async fn find_vacancies(
    plan: &Plan,
    order_coord: Coordinates,
    required_service_minutes: i64,
    required_skills: &SkillSet,
    oracle: &dyn TravelTimeOracle,
) -> Result<VacancyTable, EngineError> {
    if !order_coord.is_valid() {
        return Err(EngineError::InvalidInput(
            "prospective order has a malformed coordinate".into(),
        ));
    }

    let mut rows = Vec::new();

    for route in &plan.routes {
        let Some(phleb) = plan
            .metadata
            .phlebotomists
            .get(route.phlebotomist_index)
        else {
            continue;
        };
        let expertise: SkillSet = phleb
            .expertise
            .iter()
            .filter_map(|s| Skill::from_name(s))
            .collect();
        if !required_skills.is_subset(&expertise) {
            continue;
        }

        for idx in 0..route.locations.len().saturating_sub(1) {
            let Some(&(_, max_slack)) = route.slack_times.get(idx) else {
                continue;
            };
            // No idle time, or not enough of it to even cover the service
            if max_slack == 0 || required_service_minutes >= max_slack {
                continue;
            }

            let from_loc = route.locations[idx];
            let to_loc = route.locations[idx + 1];
            let from_coord = plan.metadata.locations[from_loc].coordinate;
            let to_coord = plan.metadata.locations[to_loc].coordinate;

            let transit_first = cell(oracle.query(&[from_coord], &[order_coord]).await?)?;
            let transit_second = cell(oracle.query(&[order_coord], &[to_coord]).await?)?;
            let total_travel_time = transit_first + transit_second;

            let min_end_current = route.end_times[idx].0;
            let max_start_next = route.start_times[idx + 1].1;

            if min_end_current + total_travel_time + required_service_minutes
                <= max_start_next
            {
                let window_start = (min_end_current + total_travel_time) / 60;
                rows.push(VacancySlot {
                    phlebotomist_index: route.phlebotomist_index,
                    total_travel_time,
                    time_window_start: window_start,
                    time_window_end: window_start + 1,
                    from_loc_idx: from_loc,
                    to_loc_idx: to_loc,
                    from_coordinates: from_coord,
                    to_coordinates: to_coord,
                });
            }
        }
    }

    rows.sort_by_key(|r| r.total_travel_time);
    debug!("Vacancy query found {} candidate slots", rows.len());

    Ok(VacancyTable { rows })
}

fn cell(matrix: Vec<Vec<i64>>) -> Result<i64, EngineError> {
    matrix
        .first()
        .and_then(|row| row.first())
        .copied()
        .ok_or_else(|| OracleError::Malformed("empty 1x1 matrix".into()).into())
}
