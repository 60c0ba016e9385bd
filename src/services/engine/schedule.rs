//! Solution serialization
//!
//! Walks each vehicle's route and reports, per visited node, the `[min, max]`
//! service-start, departure, and slack windows left by the fixed visit order,
//! plus per-route and plan-wide totals and the dropped-order accounting.
//!
//! When the model was solved with a free ending, a post-pass queries the
//! oracle once per non-empty route and attaches the nearest catchment as the
//! route terminal.

use tracing::debug;

use crate::error::EngineError;
use crate::services::routing::TravelTimeOracle;
use crate::types::{ModelSummary, Plan, PlanMode, RoutePlan};

use super::model::RoutingModel;
use super::search::Assignment;

/// Serialize a solved assignment into the external plan document.
pub fn serialize_plan(model: &RoutingModel, assignment: &Assignment) -> Plan {
    let mut routes = Vec::with_capacity(model.num_vehicles());
    let mut total_travel_time = 0i64;
    let mut total_loads = 0i64;

    for (vehicle, route) in assignment.routes.iter().enumerate() {
        let serialized = serialize_route(model, vehicle, route);
        total_travel_time += serialized.total_travel_time;
        total_loads += serialized.total_loads;
        routes.push(serialized);
    }

    let nodes_dropped = assignment.dropped.clone();
    let revenues_dropped: Vec<i64> = nodes_dropped
        .iter()
        .map(|&n| model.view.revenues[n])
        .collect();
    let total_revenue_lost = revenues_dropped.iter().sum();

    debug!(
        "Serialized plan: {} routes, {} dropped, total travel {} min",
        routes.len(),
        nodes_dropped.len(),
        total_travel_time
    );

    Plan {
        metadata: model.view.metadata.clone(),
        model: ModelSummary {
            objective: assignment.objective,
            status: assignment.status.code(),
            total_revenue_lost,
            total_nodes_dropped: nodes_dropped.len(),
            nodes_dropped,
            revenues_dropped,
            total_travel_time,
            total_loads,
        },
        routes,
    }
}

fn serialize_route(model: &RoutingModel, vehicle: usize, route: &[usize]) -> RoutePlan {
    let nodes = model.route_nodes(vehicle, route);
    let earliest = model
        .earliest_cumuls(vehicle, route)
        .expect("assignment routes are feasible");
    let latest = model
        .latest_cumuls(vehicle, route, None)
        .expect("assignment routes are feasible");

    let mut start_times = Vec::with_capacity(nodes.len());
    let mut end_times = Vec::with_capacity(nodes.len());
    let mut slack_times = Vec::with_capacity(nodes.len() - 1);

    for (i, &node) in nodes.iter().enumerate() {
        let service = model.view.service_times[node];
        start_times.push((earliest[i] - service, latest[i] - service));
        end_times.push((earliest[i], latest[i]));
        if i + 1 < nodes.len() {
            let transit = model.folded(node, nodes[i + 1]);
            let lo = (earliest[i + 1] - latest[i] - transit).max(0);
            let hi = (latest[i + 1] - earliest[i] - transit).max(0);
            slack_times.push((lo, hi));
        }
    }

    let total_travel_time = nodes.windows(2).map(|w| model.raw(w[0], w[1])).sum();

    let mut plan = RoutePlan {
        phlebotomist_index: vehicle,
        printable_route: String::new(),
        total_travel_time,
        total_loads: model.route_load(route),
        locations: nodes,
        start_times,
        end_times,
        slack_times,
    };
    plan.printable_route = render_printable(&plan);
    plan
}

/// Human-readable route line, rebuilt from the serialized sequences so the
/// multi-end post-pass can regenerate it after swapping the terminal.
fn render_printable(route: &RoutePlan) -> String {
    let mut out = format!("Route for Phlebotomist {}:\n", route.phlebotomist_index);
    let last = route.locations.len() - 1;
    for i in 0..last {
        out.push_str(&format!(
            "Location {} Start({},{}) End({},{}) -> Slack({},{}) -> ",
            route.locations[i],
            route.start_times[i].0,
            route.start_times[i].1,
            route.end_times[i].0,
            route.end_times[i].1,
            route.slack_times[i].0,
            route.slack_times[i].1,
        ));
    }
    out.push_str(&format!(
        "Location {} Time({},{})\n",
        route.locations[last], route.end_times[last].0, route.end_times[last].1,
    ));
    out
}

/// Multi-end post-pass: replace each non-empty route's notional terminal with
/// the catchment nearest to its last served stop, charging the final hop to
/// the route and plan totals. Ties break toward the lowest catchment index.
pub async fn attach_nearest_catchments(
    plan: &mut Plan,
    model: &RoutingModel,
    oracle: &dyn TravelTimeOracle,
) -> Result<(), EngineError> {
    if model.view.mode != PlanMode::Multi {
        return Ok(());
    }

    let catchment_coords: Vec<_> = model
        .view
        .catchments
        .iter()
        .map(|c| c.coordinates)
        .collect();

    for route in plan.routes.iter_mut() {
        if route.visit_count() == 0 {
            continue;
        }

        let terminal = route.locations.len() - 1;
        let last_served = route.locations[terminal - 1];
        let last_coord = plan.metadata.locations[last_served].coordinate;

        let row = oracle.query(&[last_coord], &catchment_coords).await?;
        let times = row.first().ok_or_else(|| {
            crate::error::OracleError::Malformed("empty catchment matrix row".into())
        })?;
        let (chosen, &hop) = times
            .iter()
            .enumerate()
            .min_by_key(|&(_, &t)| t)
            .ok_or_else(|| {
                crate::error::OracleError::Malformed("no catchments in matrix row".into())
            })?;

        let reach = route.end_times[terminal - 1].1 + hop;
        route.locations[terminal] = model.view.num_nodes() + chosen;
        route.start_times[terminal] = (reach, reach);
        route.end_times[terminal] = (reach, reach);
        route.total_travel_time += hop;
        plan.model.total_travel_time += hop;
        route.printable_route = render_printable(route);
    }

    Ok(())
}
