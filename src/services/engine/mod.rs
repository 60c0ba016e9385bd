//! Routing and scheduling engine
//!
//! One plan request flows through featurization, model building, the search
//! driver, and serialization; multi-end plans get a terminal catchment
//! post-pass. The engine is synchronous CPU work between two suspension
//! points: the oracle matrix call up front and the per-route catchment
//! lookups at the end.

pub mod model;
pub mod schedule;
pub mod search;
pub mod view;

pub use model::RoutingModel;
pub use schedule::{attach_nearest_catchments, serialize_plan};
pub use search::{Assignment, SolveStatus, SolverConfig, SolverDriver};
pub use view::{build_view, build_view_with_matrix, SolverView};

use std::time::Duration;

use tracing::info;

use crate::error::EngineError;
use crate::services::routing::TravelTimeOracle;
use crate::types::{Catchment, Order, Plan, PlanRequest, Technician};

/// Plan engine facade.
pub struct PlanEngine {
    config: SolverConfig,
}

impl PlanEngine {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Compute a plan for one request, querying the oracle for travel times.
    pub async fn plan(
        &self,
        request: &PlanRequest,
        oracle: &dyn TravelTimeOracle,
    ) -> Result<Plan, EngineError> {
        let mut config = self.config.clone();
        config.time_budget = Duration::from_secs(request.time_budget_s);

        info!(
            "Planning {} orders over {} technicians ({:?} mode, budget {}s)",
            request.orders.len(),
            request.technicians.len(),
            request.mode,
            request.time_budget_s
        );

        let view = view::build_view(
            &request.orders,
            &request.technicians,
            &request.catchments,
            oracle,
            request.mode,
        )
        .await?;
        let model = RoutingModel::new(view);
        let assignment = SolverDriver::new(config).solve(&model)?;
        let mut plan = serialize_plan(&model, &assignment);
        attach_nearest_catchments(&mut plan, &model, oracle).await?;

        info!(
            "Plan ready: objective {}, {} dropped, travel {} min",
            plan.model.objective, plan.model.total_nodes_dropped, plan.model.total_travel_time
        );
        Ok(plan)
    }

    /// Compute a single-end plan from an already-computed raw time matrix,
    /// with no oracle in the loop. Used by the scenario sweep and anywhere a
    /// matrix is replayed.
    pub fn plan_with_matrix(
        &self,
        orders: &[Order],
        technicians: &[Technician],
        catchments: &[Catchment],
        matrix: Vec<Vec<i64>>,
    ) -> Result<Plan, EngineError> {
        let view = build_view_with_matrix(orders, technicians, catchments, matrix)?;
        let model = RoutingModel::new(view);
        let assignment = SolverDriver::new(self.config.clone()).solve(&model)?;
        Ok(serialize_plan(&model, &assignment))
    }
}

impl Default for PlanEngine {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::types::{Coordinates, Order, PlanMode, Skill, Technician};
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Manhattan-distance stub oracle, two minutes per coordinate degree.
    struct GridOracle;

    #[async_trait]
    impl TravelTimeOracle for GridOracle {
        async fn query(
            &self,
            origins: &[Coordinates],
            destinations: &[Coordinates],
        ) -> Result<Vec<Vec<i64>>, OracleError> {
            Ok(origins
                .iter()
                .map(|a| {
                    destinations
                        .iter()
                        .map(|b| {
                            (((a.lat - b.lat).abs() + (a.lng - b.lng).abs()) * 2.0).round()
                                as i64
                        })
                        .collect()
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Grid"
        }
    }

    fn engine() -> PlanEngine {
        PlanEngine::new(SolverConfig::fast())
    }

    fn tech(top: Skill, lat: f64) -> Technician {
        Technician::from_top_skill(Uuid::new_v4(), Coordinates::new(lat, lat), 360, top, 4.0)
    }

    fn order(start: i64, services: &[Skill], lat: f64) -> Order {
        Order::from_services(Uuid::new_v4(), Coordinates::new(lat, lat), start, services)
    }

    fn request(
        orders: Vec<Order>,
        technicians: Vec<Technician>,
        catchments: Vec<Catchment>,
        mode: PlanMode,
    ) -> PlanRequest {
        PlanRequest {
            orders,
            technicians,
            catchments,
            mode,
            time_budget_s: 2,
        }
    }

    #[tokio::test]
    async fn test_trivial_plan_end_to_end() {
        let req = request(
            vec![order(420, &[Skill::Regular], 5.0)],
            vec![tech(Skill::Regular, 5.0)],
            vec![Catchment::new(Uuid::new_v4(), Coordinates::new(5.0, 5.0))],
            PlanMode::Single,
        );
        let plan = engine().plan(&req, &GridOracle).await.unwrap();

        assert_eq!(plan.model.status, 1);
        assert_eq!(plan.model.total_nodes_dropped, 0);
        let route = &plan.routes[0];
        assert_eq!(route.locations, vec![1, 2, 0]);
        assert_eq!(route.start_times[1].0, 420);
    }

    #[tokio::test]
    async fn test_invalid_request_surfaces_invalid_input() {
        let req = request(
            vec![],
            vec![],
            vec![Catchment::new(Uuid::new_v4(), Coordinates::new(5.0, 5.0))],
            PlanMode::Single,
        );
        let err = engine().plan(&req, &GridOracle).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    /// Every invariant the engine promises of a returned plan, checked on a
    /// mixed instance: window feasibility, shift containment, capacity,
    /// eligibility, coverage disjointness, and penalty dominance.
    #[tokio::test]
    async fn test_plan_invariants_on_mixed_instance() {
        let orders = vec![
            order(390, &[Skill::Regular], 5.2),
            order(420, &[Skill::Premium], 5.8),
            order(480, &[Skill::Regular, Skill::Regular], 6.4),
            order(510, &[Skill::Special], 5.5),
            order(540, &[Skill::Regular], 6.9),
            order(570, &[Skill::Premium, Skill::Regular], 5.1),
        ];
        let technicians = vec![tech(Skill::Premium, 5.0), tech(Skill::Special, 6.0)];
        let catchments = vec![Catchment::new(Uuid::new_v4(), Coordinates::new(5.5, 5.5))];

        let oracle = GridOracle;
        let view = build_view(&orders, &technicians, &catchments, &oracle, PlanMode::Single)
            .await
            .unwrap();
        let model = RoutingModel::new(view);
        let assignment = SolverDriver::new(SolverConfig::fast()).solve(&model).unwrap();
        let plan = serialize_plan(&model, &assignment);

        let first_order = model.view.first_order_node();

        // Coverage disjointness: each order node in exactly one route or the
        // dropped list, never both, never neither
        let mut seen = vec![0usize; model.view.num_nodes()];
        for route in &plan.routes {
            for &node in &route.locations[1..route.locations.len() - 1] {
                seen[node] += 1;
            }
        }
        for &node in &plan.model.nodes_dropped {
            seen[node] += 1;
        }
        for node in first_order..model.view.num_nodes() {
            assert_eq!(seen[node], 1, "order node {} covered {} times", node, seen[node]);
        }

        for (vehicle, route) in plan.routes.iter().enumerate() {
            let tech = &technicians[vehicle];
            let mut load = 0i64;
            for (i, &node) in route.locations.iter().enumerate() {
                if node < first_order {
                    continue;
                }
                let order = &orders[node - first_order];
                // Window feasibility: the reported service-start window
                // overlaps the requested window
                let (lo, hi) = route.start_times[i];
                assert!(lo <= hi);
                assert!(
                    lo <= order.latest_start_min() && hi >= order.requested_start_min,
                    "window [{},{}] misses request [{},{}]",
                    lo,
                    hi,
                    order.requested_start_min,
                    order.latest_start_min()
                );
                // Eligibility
                assert!(tech.expertise.is_superset(&order.required_skills));
                load += order.demand;
            }
            // Capacity
            assert!(load <= tech.capacity);
            // Shift containment: first departure within the shift, terminal
            // arrival within the end window
            assert!(route.end_times[0].0 >= tech.shift_start_min);
            let last = route.locations.len() - 1;
            let (end_lo, end_hi) = model.cumul_window(0);
            assert!(route.end_times[last].0 >= end_lo);
            assert!(route.end_times[last].1 <= end_hi);
        }

        // Penalty dominance: dropping any single served order cannot improve
        // the objective
        for (vehicle, route) in assignment.routes.iter().enumerate() {
            for (pos, &node) in route.iter().enumerate() {
                let mut routes = assignment.routes.clone();
                routes[vehicle].remove(pos);
                let mut dropped = assignment.dropped.clone();
                dropped.push(node);
                let alternative = model.objective(&routes, &dropped).unwrap();
                assert!(
                    alternative >= assignment.objective,
                    "dropping node {} improved the objective",
                    node
                );
            }
        }
    }

    #[tokio::test]
    async fn test_multi_end_plan_terminates_at_catchments() {
        let req = request(
            vec![order(420, &[Skill::Regular], 9.5), order(540, &[Skill::Regular], 10.0)],
            vec![tech(Skill::Regular, 5.0)],
            vec![
                Catchment::new(Uuid::new_v4(), Coordinates::new(0.0, 0.0)),
                Catchment::new(Uuid::new_v4(), Coordinates::new(10.0, 10.0)),
            ],
            PlanMode::Multi,
        );
        let plan = engine().plan(&req, &GridOracle).await.unwrap();

        let route = &plan.routes[0];
        let terminal = *route.locations.last().unwrap();
        assert_eq!(
            plan.metadata.locations[terminal].kind,
            crate::types::NodeKind::Catchment
        );
        // Nearest catchment to the (10,10) cluster is index 1
        assert_eq!(plan.metadata.locations[terminal].coordinate.lat, 10.0);
    }
}
