//! Input featurization
//!
//! Lifts business entities into the numeric view the solver consumes: one
//! flat node index space, a raw travel-time matrix, per-node windows and
//! demands, drop penalties, eligibility lists, and a metadata side table for
//! reverse mapping.
//!
//! Node numbering is a contract the serializer relies on: index 0 is the
//! (possibly notional) end node, indices 1..=K are technician start nodes in
//! input order, and indices K+1.. are order nodes in input order.

use tracing::{debug, warn};

use crate::error::{EngineError, OracleError};
use crate::services::routing::TravelTimeOracle;
use crate::types::{
    Catchment, Coordinates, LocationMeta, NodeKind, Order, PhlebotomistMeta, PlanMetadata,
    PlanMode, Technician,
};

use super::model::HORIZON_MINUTES;

/// Immutable numeric view of one planning problem.
#[derive(Debug, Clone)]
pub struct SolverView {
    /// Resolved ending mode (an input of `Single` with several catchments is
    /// upgraded to `Multi`).
    pub mode: PlanMode,
    pub num_vehicles: usize,
    /// Raw travel minutes, N x N. In multi-end mode row 0 and column 0 are
    /// zero so the solver treats the route ending as free.
    pub time_matrix: Vec<Vec<i64>>,
    /// On-site minutes per node; zero outside the order block.
    pub service_times: Vec<i64>,
    /// Service-start windows per node; index 0 holds the end-node window.
    pub time_windows: Vec<(i64, i64)>,
    /// Capacity units consumed per node; zero outside the order block.
    pub demands: Vec<i64>,
    /// Carrying capacity per vehicle.
    pub capacities: Vec<i64>,
    /// Order revenue per node; zero outside the order block.
    pub revenues: Vec<i64>,
    /// Drop penalty per node: revenue scaled so that dropping always loses
    /// against any routing-time saving.
    pub penalties: Vec<i64>,
    /// The scale relating `penalties` back to `revenues`.
    pub penalty_scale: i64,
    /// Vehicles allowed at each node; empty outside the order block.
    pub eligibility: Vec<Vec<usize>>,
    /// Time-span cost weight per vehicle.
    pub span_coefficients: Vec<i64>,
    pub metadata: PlanMetadata,
    pub catchments: Vec<Catchment>,
}

impl SolverView {
    pub fn num_nodes(&self) -> usize {
        self.time_matrix.len()
    }

    pub fn start_node(&self, vehicle: usize) -> usize {
        1 + vehicle
    }

    pub fn first_order_node(&self) -> usize {
        1 + self.num_vehicles
    }

    pub fn order_nodes(&self) -> std::ops::Range<usize> {
        self.first_order_node()..self.num_nodes()
    }
}

/// Build the solver view, querying the oracle for the travel-time matrix.
pub async fn build_view(
    orders: &[Order],
    technicians: &[Technician],
    catchments: &[Catchment],
    oracle: &dyn TravelTimeOracle,
    mode: PlanMode,
) -> Result<SolverView, EngineError> {
    validate_inputs(orders, technicians, catchments)?;
    let mode = resolve_mode(mode, catchments);

    let matrix = match mode {
        PlanMode::Single => {
            let mut coords = vec![catchments[0].coordinates];
            coords.extend(technicians.iter().map(|t| t.home));
            coords.extend(orders.iter().map(|o| o.coordinates));
            let matrix = oracle.query(&coords, &coords).await?;
            check_matrix(&matrix, coords.len())?;
            matrix
        }
        PlanMode::Multi => {
            let mut coords: Vec<Coordinates> =
                technicians.iter().map(|t| t.home).collect();
            coords.extend(orders.iter().map(|o| o.coordinates));
            let inner = oracle.query(&coords, &coords).await?;
            check_matrix(&inner, coords.len())?;
            pad_free_end(inner)
        }
    };

    Ok(assemble(orders, technicians, catchments, matrix, mode))
}

/// Build a single-end view from an already-computed raw matrix
/// (1 + technicians + orders on both axes, catchment first).
pub fn build_view_with_matrix(
    orders: &[Order],
    technicians: &[Technician],
    catchments: &[Catchment],
    matrix: Vec<Vec<i64>>,
) -> Result<SolverView, EngineError> {
    validate_inputs(orders, technicians, catchments)?;
    if catchments.len() > 1 {
        return Err(EngineError::InvalidInput(
            "a precomputed matrix implies single-end mode; got multiple catchments".into(),
        ));
    }

    let expected = 1 + technicians.len() + orders.len();
    if matrix.len() != expected {
        return Err(EngineError::InvalidInput(format!(
            "time matrix has {} rows, expected {}",
            matrix.len(),
            expected
        )));
    }
    check_matrix(&matrix, expected)?;

    Ok(assemble(orders, technicians, catchments, matrix, PlanMode::Single))
}

fn resolve_mode(mode: PlanMode, catchments: &[Catchment]) -> PlanMode {
    if mode == PlanMode::Single && catchments.len() > 1 {
        warn!(
            "{} catchments given in single-end mode; switching to multi-end",
            catchments.len()
        );
        return PlanMode::Multi;
    }
    mode
}

fn validate_inputs(
    orders: &[Order],
    technicians: &[Technician],
    catchments: &[Catchment],
) -> Result<(), EngineError> {
    if technicians.is_empty() {
        return Err(EngineError::InvalidInput("technician list is empty".into()));
    }
    if catchments.is_empty() {
        return Err(EngineError::InvalidInput("catchment list is empty".into()));
    }

    for tech in technicians {
        if !tech.home.is_valid() {
            return Err(EngineError::InvalidInput(format!(
                "technician {} has a malformed home coordinate",
                tech.id
            )));
        }
        if tech.shift_start_min < 0 || tech.shift_end_min < tech.shift_start_min {
            return Err(EngineError::InvalidInput(format!(
                "technician {} has an inverted shift window [{}, {}]",
                tech.id, tech.shift_start_min, tech.shift_end_min
            )));
        }
        if tech.break_start_min < 0 {
            return Err(EngineError::InvalidInput(format!(
                "technician {} has a negative break start",
                tech.id
            )));
        }
        if tech.capacity < 0 {
            return Err(EngineError::InvalidInput(format!(
                "technician {} has a negative capacity",
                tech.id
            )));
        }
    }

    for order in orders {
        if !order.coordinates.is_valid() {
            return Err(EngineError::InvalidInput(format!(
                "order {} has a malformed coordinate",
                order.id
            )));
        }
        if order.requested_start_min < 0 {
            return Err(EngineError::InvalidInput(format!(
                "order {} has a negative requested start",
                order.id
            )));
        }
        if order.service_minutes < 0 || order.demand < 0 {
            return Err(EngineError::InvalidInput(format!(
                "order {} has negative service time or demand",
                order.id
            )));
        }
    }

    for catchment in catchments {
        if !catchment.coordinates.is_valid() {
            return Err(EngineError::InvalidInput(format!(
                "catchment {} has a malformed coordinate",
                catchment.id
            )));
        }
    }

    Ok(())
}

fn check_matrix(matrix: &[Vec<i64>], expected: usize) -> Result<(), EngineError> {
    if matrix.len() != expected {
        return Err(OracleError::Malformed(format!(
            "expected {} rows, got {}",
            expected,
            matrix.len()
        ))
        .into());
    }
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != expected {
            return Err(OracleError::Malformed(format!(
                "expected {} columns in row {}, got {}",
                expected,
                i,
                row.len()
            ))
            .into());
        }
        if row.iter().any(|&cell| cell < 0) {
            return Err(
                OracleError::Malformed(format!("negative travel time in row {}", i)).into(),
            );
        }
    }
    Ok(())
}

/// Grow the matrix by a zero row 0 and zero column 0 so arriving at the end
/// node costs nothing from anywhere.
fn pad_free_end(inner: Vec<Vec<i64>>) -> Vec<Vec<i64>> {
    let n = inner.len() + 1;
    let mut padded = vec![vec![0i64; n]; n];
    for (i, row) in inner.into_iter().enumerate() {
        for (j, cell) in row.into_iter().enumerate() {
            padded[i + 1][j + 1] = cell;
        }
    }
    padded
}

fn assemble(
    orders: &[Order],
    technicians: &[Technician],
    catchments: &[Catchment],
    matrix: Vec<Vec<i64>>,
    mode: PlanMode,
) -> SolverView {
    let num_vehicles = technicians.len();
    let num_nodes = matrix.len();

    let mut service_times = vec![0i64; num_nodes];
    let mut demands = vec![0i64; num_nodes];
    let mut revenues = vec![0i64; num_nodes];
    let mut time_windows = vec![(0i64, 0i64); num_nodes];
    let mut eligibility = vec![Vec::new(); num_nodes];

    // End-node window: break-aligned catchment arrival in single-end mode,
    // fully permissive when the ending is free.
    time_windows[0] = match mode {
        PlanMode::Single => {
            let lo = technicians
                .iter()
                .map(|t| t.break_start_min)
                .min()
                .unwrap_or(0);
            let hi = technicians
                .iter()
                .map(|t| t.break_start_min)
                .max()
                .unwrap_or(0)
                + Order::WINDOW_MINUTES;
            (lo, hi)
        }
        PlanMode::Multi => (0, HORIZON_MINUTES),
    };

    for (v, tech) in technicians.iter().enumerate() {
        time_windows[1 + v] = (tech.shift_start_min, tech.shift_end_min);
    }

    // Penalty scale: total raw travel time out of the first technician start,
    // floored so that no arc or span-cost saving obtainable within the
    // horizon can ever beat a drop penalty (revenue is at least 1).
    let max_span_coefficient = technicians
        .iter()
        .map(|t| t.span_cost_coefficient())
        .max()
        .unwrap_or(0);
    let dominance_floor = HORIZON_MINUTES * (2 + max_span_coefficient);
    let penalty_scale = matrix[1].iter().sum::<i64>().max(dominance_floor);

    let first_order = 1 + num_vehicles;
    for (k, order) in orders.iter().enumerate() {
        let node = first_order + k;
        service_times[node] = order.service_minutes;
        demands[node] = order.demand;
        revenues[node] = order.revenue;
        time_windows[node] = (order.requested_start_min, order.latest_start_min());
        eligibility[node] = technicians
            .iter()
            .enumerate()
            .filter(|(_, tech)| {
                tech.expertise.is_superset(&order.required_skills)
                    && order
                        .preferred_gender
                        .map_or(true, |g| tech.gender == Some(g))
            })
            .map(|(v, _)| v)
            .collect();
    }

    let penalties = revenues.iter().map(|r| r * penalty_scale).collect();

    let mut locations = Vec::with_capacity(num_nodes + catchments.len());
    match mode {
        PlanMode::Single => locations.push(LocationMeta {
            order_id: None,
            phleb_id: None,
            coordinate: catchments[0].coordinates,
            kind: NodeKind::Catchment,
            skills: None,
        }),
        PlanMode::Multi => locations.push(LocationMeta {
            order_id: None,
            phleb_id: None,
            coordinate: Coordinates::new(0.0, 0.0),
            kind: NodeKind::End,
            skills: None,
        }),
    }
    for tech in technicians {
        locations.push(LocationMeta {
            order_id: None,
            phleb_id: Some(tech.id),
            coordinate: tech.home,
            kind: NodeKind::Start,
            skills: Some(tech.expertise.clone()),
        });
    }
    for order in orders {
        locations.push(LocationMeta {
            order_id: Some(order.id),
            phleb_id: None,
            coordinate: order.coordinates,
            kind: NodeKind::Order,
            skills: Some(order.required_skills.clone()),
        });
    }
    if mode == PlanMode::Multi {
        // Catchments live past the matrix block; the serializer's end-node
        // post-pass points route terminals at these entries.
        for catchment in catchments {
            locations.push(LocationMeta {
                order_id: None,
                phleb_id: None,
                coordinate: catchment.coordinates,
                kind: NodeKind::Catchment,
                skills: None,
            });
        }
    }

    let phlebotomists = technicians
        .iter()
        .map(|t| PhlebotomistMeta {
            id: t.id,
            expertise: t.expertise.iter().map(|s| s.as_str().to_string()).collect(),
        })
        .collect();

    debug!(
        "Featurized {} orders, {} technicians, {} catchments into {} nodes ({:?} mode)",
        orders.len(),
        num_vehicles,
        catchments.len(),
        num_nodes,
        mode
    );

    SolverView {
        mode,
        num_vehicles,
        time_matrix: matrix,
        service_times,
        time_windows,
        demands,
        capacities: technicians.iter().map(|t| t.capacity).collect(),
        revenues,
        penalties,
        penalty_scale,
        eligibility,
        span_coefficients: technicians
            .iter()
            .map(|t| t.span_cost_coefficient())
            .collect(),
        metadata: PlanMetadata {
            locations,
            phlebotomists,
        },
        catchments: catchments.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Skill;
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Oracle returning a constant travel time between distinct points.
    struct ConstOracle(i64);

    #[async_trait]
    impl TravelTimeOracle for ConstOracle {
        async fn query(
            &self,
            origins: &[Coordinates],
            destinations: &[Coordinates],
        ) -> Result<Vec<Vec<i64>>, OracleError> {
            Ok(origins
                .iter()
                .map(|from| {
                    destinations
                        .iter()
                        .map(|to| if from == to { 0 } else { self.0 })
                        .collect()
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Const"
        }
    }

    fn tech(top: Skill, lat: f64) -> Technician {
        Technician::from_top_skill(
            Uuid::new_v4(),
            Coordinates::new(lat, 77.0),
            360,
            top,
            4.0,
        )
    }

    fn order(start: i64, services: &[Skill], lat: f64) -> Order {
        Order::from_services(Uuid::new_v4(), Coordinates::new(lat, 77.1), start, services)
    }

    fn catchment(lat: f64) -> Catchment {
        Catchment::new(Uuid::new_v4(), Coordinates::new(lat, 76.9))
    }

    #[tokio::test]
    async fn test_node_numbering_contract() {
        let orders = vec![order(420, &[Skill::Regular], 28.1), order(480, &[Skill::Premium], 28.2)];
        let techs = vec![tech(Skill::Special, 28.3)];
        let view = build_view(
            &orders,
            &techs,
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap();

        assert_eq!(view.num_nodes(), 4);
        assert_eq!(view.first_order_node(), 2);
        assert_eq!(view.metadata.locations[0].kind, NodeKind::Catchment);
        assert_eq!(view.metadata.locations[1].kind, NodeKind::Start);
        assert_eq!(view.metadata.locations[2].kind, NodeKind::Order);
        assert_eq!(view.metadata.locations[2].order_id, Some(orders[0].id));
        assert_eq!(view.metadata.locations[3].order_id, Some(orders[1].id));
    }

    #[tokio::test]
    async fn test_windows_and_service_vectors() {
        let orders = vec![order(420, &[Skill::Regular, Skill::Special], 28.1)];
        let techs = vec![tech(Skill::Special, 28.3)];
        let view = build_view(
            &orders,
            &techs,
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap();

        // End window tracks the break interval
        assert_eq!(view.time_windows[0], (600, 660));
        // Start window tracks the shift
        assert_eq!(view.time_windows[1], (360, 840));
        // Order window is requested..requested+60
        assert_eq!(view.time_windows[2], (420, 480));
        assert_eq!(view.service_times, vec![0, 0, 30]);
        assert_eq!(view.demands[2], 2);
        assert_eq!(view.revenues[2], 600);
    }

    #[tokio::test]
    async fn test_penalty_dominates_routing_saving() {
        let orders = vec![order(420, &[Skill::Regular], 28.1)];
        let techs = vec![tech(Skill::Regular, 28.3)];
        let view = build_view(
            &orders,
            &techs,
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap();

        let row_sum: i64 = view.time_matrix[1].iter().sum();
        let node = view.first_order_node();
        assert!(view.penalty_scale >= row_sum);
        assert_eq!(view.penalties[node], view.revenues[node] * view.penalty_scale);
        // Penalty never falls below row-1 travel times revenue
        assert!(view.penalties[node] >= row_sum * view.revenues[node]);
        // The floor covers the worst span-cost saving within the horizon
        let coeff = techs[0].span_cost_coefficient();
        assert!(view.penalty_scale >= HORIZON_MINUTES * (2 + coeff));
    }

    #[tokio::test]
    async fn test_penalty_scale_floor_on_zero_matrix() {
        let orders = vec![order(420, &[Skill::Regular], 28.1)];
        let techs = vec![tech(Skill::Regular, 28.3)];
        let view = build_view(
            &orders,
            &techs,
            &[catchment(28.4)],
            &ConstOracle(0),
            PlanMode::Single,
        )
        .await
        .unwrap();

        // Even an all-zero matrix keeps drop penalties dominant
        let coeff = techs[0].span_cost_coefficient();
        assert_eq!(view.penalty_scale, HORIZON_MINUTES * (2 + coeff));
    }

    #[tokio::test]
    async fn test_eligibility_respects_expertise_and_gender() {
        let mut restricted = order(420, &[Skill::Premium], 28.1);
        restricted.preferred_gender = Some(crate::types::Gender::Female);

        let mut t_regular = tech(Skill::Regular, 28.3);
        t_regular.gender = Some(crate::types::Gender::Female);
        let mut t_premium_male = tech(Skill::Premium, 28.5);
        t_premium_male.gender = Some(crate::types::Gender::Male);
        let mut t_special_female = tech(Skill::Special, 28.7);
        t_special_female.gender = Some(crate::types::Gender::Female);

        let techs = vec![t_regular, t_premium_male, t_special_female];
        let view = build_view(
            &[restricted],
            &techs,
            &[catchment(28.4)],
            &ConstOracle(5),
            PlanMode::Single,
        )
        .await
        .unwrap();

        // Only the special-rated female technician is eligible
        assert_eq!(view.eligibility[view.first_order_node()], vec![2]);
    }

    #[tokio::test]
    async fn test_multi_end_pads_zero_row_and_column() {
        let orders = vec![order(420, &[Skill::Regular], 28.1)];
        let techs = vec![tech(Skill::Regular, 28.3)];
        let catchments = vec![catchment(28.4), catchment(28.9)];
        let view = build_view(
            &orders,
            &techs,
            &catchments,
            &ConstOracle(10),
            PlanMode::Multi,
        )
        .await
        .unwrap();

        assert_eq!(view.num_nodes(), 3); // padding end + 1 start + 1 order
        assert!(view.time_matrix[0].iter().all(|&c| c == 0));
        assert!(view.time_matrix.iter().all(|row| row[0] == 0));
        assert_eq!(view.time_windows[0], (0, HORIZON_MINUTES));
        // Catchment entries follow the order block in the metadata
        assert_eq!(view.metadata.locations.len(), 5);
        assert_eq!(view.metadata.locations[3].kind, NodeKind::Catchment);
        assert_eq!(view.metadata.locations[4].kind, NodeKind::Catchment);
    }

    #[tokio::test]
    async fn test_silent_upgrade_to_multi_end() {
        let orders = vec![order(420, &[Skill::Regular], 28.1)];
        let techs = vec![tech(Skill::Regular, 28.3)];
        let catchments = vec![catchment(28.4), catchment(28.9)];
        let view = build_view(
            &orders,
            &techs,
            &catchments,
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap();

        assert_eq!(view.mode, PlanMode::Multi);
    }

    #[tokio::test]
    async fn test_empty_technicians_rejected() {
        let err = build_view(
            &[order(420, &[Skill::Regular], 28.1)],
            &[],
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[tokio::test]
    async fn test_malformed_coordinate_rejected() {
        let mut bad = order(420, &[Skill::Regular], 28.1);
        bad.coordinates = Coordinates::new(95.0, 77.0);
        let err = build_view(
            &[bad],
            &[tech(Skill::Regular, 28.3)],
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[tokio::test]
    async fn test_inverted_shift_rejected() {
        let mut bad = tech(Skill::Regular, 28.3);
        bad.shift_end_min = bad.shift_start_min - 1;
        let err = build_view(
            &[order(420, &[Skill::Regular], 28.1)],
            &[bad],
            &[catchment(28.4)],
            &ConstOracle(10),
            PlanMode::Single,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn test_build_view_with_matrix_checks_dimensions() {
        let orders = vec![order(420, &[Skill::Regular], 28.1)];
        let techs = vec![tech(Skill::Regular, 28.3)];
        let err = build_view_with_matrix(
            &orders,
            &techs,
            &[catchment(28.4)],
            vec![vec![0; 2]; 2], // should be 3x3
        )
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");

        let view = build_view_with_matrix(
            &orders,
            &techs,
            &[catchment(28.4)],
            vec![vec![0, 5, 7], vec![5, 0, 9], vec![7, 9, 0]],
        )
        .unwrap();
        assert_eq!(view.num_nodes(), 3);
        assert!(view.penalty_scale >= 14);
    }
}
