//! Plan request and plan result types
//!
//! The result types serialize with the external key names of the planning
//! API (spaced, capitalized) so downstream consumers and the vacancy query
//! can treat a stored plan as a stable document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catchment::Catchment;
use super::coordinates::Coordinates;
use super::order::Order;
use super::skill::SkillSet;
use super::technician::Technician;

/// Route ending mode.
///
/// `Single`: every route ends at the one configured catchment, whose arrival
/// window is aligned to the technicians' break interval. `Multi`: routes end
/// freely and the nearest catchment is attached per route after solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    Single,
    Multi,
}

impl Default for PlanMode {
    fn default() -> Self {
        Self::Single
    }
}

fn default_time_budget_s() -> u64 {
    30
}

/// One plan request: the full day's input for a single planning horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub orders: Vec<Order>,
    pub technicians: Vec<Technician>,
    pub catchments: Vec<Catchment>,
    #[serde(default)]
    pub mode: PlanMode,
    #[serde(default = "default_time_budget_s")]
    pub time_budget_s: u64,
}

/// Role of a node in the solver's index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    End,
    Catchment,
    Start,
    Order,
}

/// Reverse-mapping entry for one node index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationMeta {
    #[serde(rename = "Order Id", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(rename = "Phleb Id", default, skip_serializing_if = "Option::is_none")]
    pub phleb_id: Option<Uuid>,
    #[serde(rename = "Coordinate")]
    pub coordinate: Coordinates,
    #[serde(rename = "Kind")]
    pub kind: NodeKind,
    #[serde(rename = "Skills", default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<SkillSet>,
}

/// Technician summary carried with the plan for eligibility re-checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhlebotomistMeta {
    #[serde(rename = "Id")]
    pub id: Uuid,
    #[serde(rename = "Expertise")]
    pub expertise: Vec<String>,
}

/// Node-index side table of the solver view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(rename = "Locations")]
    pub locations: Vec<LocationMeta>,
    #[serde(rename = "Phlebotomists")]
    pub phlebotomists: Vec<PhlebotomistMeta>,
}

/// Plan-wide objective and drop accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    #[serde(rename = "Objective Number")]
    pub objective: i64,
    #[serde(rename = "Status")]
    pub status: i32,
    #[serde(rename = "Total Revenue Lost")]
    pub total_revenue_lost: i64,
    #[serde(rename = "Total Number of Nodes Dropped")]
    pub total_nodes_dropped: usize,
    #[serde(rename = "Nodes Dropped")]
    pub nodes_dropped: Vec<usize>,
    #[serde(rename = "Revenues Dropped")]
    pub revenues_dropped: Vec<i64>,
    #[serde(rename = "Total Travel Time")]
    pub total_travel_time: i64,
    #[serde(rename = "Total Loads")]
    pub total_loads: i64,
}

/// One technician's scheduled route.
///
/// The three time sequences are parallel to `locations`: per node, the
/// `[min, max]` service-start window, the `[min, max]` departure window, and
/// (for non-terminal nodes) the `[min, max]` idle slack toward the next node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    #[serde(rename = "Phlebotomist Index")]
    pub phlebotomist_index: usize,
    #[serde(rename = "Printable Route")]
    pub printable_route: String,
    #[serde(rename = "Total Travel Time")]
    pub total_travel_time: i64,
    #[serde(rename = "Total Loads")]
    pub total_loads: i64,
    #[serde(rename = "Locations Sequence")]
    pub locations: Vec<usize>,
    #[serde(rename = "Start Times Sequence")]
    pub start_times: Vec<(i64, i64)>,
    #[serde(rename = "End Times Sequence")]
    pub end_times: Vec<(i64, i64)>,
    #[serde(rename = "Slack Times Sequence")]
    pub slack_times: Vec<(i64, i64)>,
}

impl RoutePlan {
    /// Number of order visits (route minus its start and terminal nodes).
    pub fn visit_count(&self) -> usize {
        self.locations.len().saturating_sub(2)
    }
}

/// A complete serialized plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "Metadata")]
    pub metadata: PlanMetadata,
    #[serde(rename = "Model")]
    pub model: ModelSummary,
    #[serde(rename = "Routes")]
    pub routes: Vec<RoutePlan>,
}
