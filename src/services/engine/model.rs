//! Constrained VRP model
//!
//! Assembles the routing problem from the featurized view: service-folded
//! transit costs, shift-anchored time cumuls with per-node windows, unary
//! capacity demands, drop penalties per order, allowed-vehicle sets, and
//! per-vehicle time-span cost coefficients.
//!
//! A route is the sequence of order nodes a vehicle serves; its start node
//! and the shared end node 0 are implicit. Time cumuls follow the folded
//! matrix, so the cumul at an order node is its service-completion minute and
//! the raw arrival is cumul minus service.

use super::view::SolverView;

/// Planning horizon in minutes ("arbitrarily large").
pub const HORIZON_MINUTES: i64 = 10_000;

#[derive(Debug)]
pub struct RoutingModel {
    pub view: SolverView,
    /// Raw matrix with every column incremented by that node's service time.
    folded: Vec<Vec<i64>>,
    /// Allowed time-cumul range per node: order windows shifted by their
    /// service time, shift windows at starts, the end window at node 0.
    cumul_windows: Vec<(i64, i64)>,
}

impl RoutingModel {
    pub fn new(view: SolverView) -> Self {
        let n = view.num_nodes();

        let mut folded = view.time_matrix.clone();
        for row in folded.iter_mut() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell += view.service_times[j];
            }
        }

        let mut cumul_windows = Vec::with_capacity(n);
        for node in 0..n {
            let (lo, hi) = view.time_windows[node];
            let service = view.service_times[node];
            cumul_windows.push((lo + service, hi + service));
        }

        Self {
            view,
            folded,
            cumul_windows,
        }
    }

    pub fn num_vehicles(&self) -> usize {
        self.view.num_vehicles
    }

    pub fn start_node(&self, vehicle: usize) -> usize {
        self.view.start_node(vehicle)
    }

    /// Transit cost with destination service folded in.
    pub fn folded(&self, from: usize, to: usize) -> i64 {
        self.folded[from][to]
    }

    /// Raw travel minutes.
    pub fn raw(&self, from: usize, to: usize) -> i64 {
        self.view.time_matrix[from][to]
    }

    pub fn cumul_window(&self, node: usize) -> (i64, i64) {
        self.cumul_windows[node]
    }

    pub fn penalty(&self, node: usize) -> i64 {
        self.view.penalties[node]
    }

    /// Vehicle variable restriction of an order node; dropping is always an
    /// alternative to any listed vehicle.
    pub fn vehicle_allowed(&self, vehicle: usize, node: usize) -> bool {
        self.view.eligibility[node].contains(&vehicle)
    }

    /// Full node sequence of a route: start, served orders, end.
    pub fn route_nodes(&self, vehicle: usize, route: &[usize]) -> Vec<usize> {
        let mut nodes = Vec::with_capacity(route.len() + 2);
        nodes.push(self.start_node(vehicle));
        nodes.extend_from_slice(route);
        nodes.push(0);
        nodes
    }

    pub fn route_load(&self, route: &[usize]) -> i64 {
        route.iter().map(|&n| self.view.demands[n]).sum()
    }

    /// Earliest feasible cumul at every node of the route (start, orders,
    /// end), or `None` when some window cannot be met.
    pub fn earliest_cumuls(&self, vehicle: usize, route: &[usize]) -> Option<Vec<i64>> {
        let nodes = self.route_nodes(vehicle, route);
        let mut cumuls = Vec::with_capacity(nodes.len());

        let (start_lo, start_hi) = self.cumul_window(nodes[0]);
        if start_lo > start_hi {
            return None;
        }
        cumuls.push(start_lo);

        for w in nodes.windows(2) {
            let (lo, hi) = self.cumul_window(w[1]);
            let arrival = *cumuls.last().expect("route has a start") + self.folded(w[0], w[1]);
            let cumul = arrival.max(lo);
            if cumul > hi {
                return None;
            }
            cumuls.push(cumul);
        }

        Some(cumuls)
    }

    /// Latest cumuls compatible with the windows, walking backward from the
    /// end node. `anchor` caps the end cumul (used for span measurement);
    /// without it the end window's upper bound applies.
    pub fn latest_cumuls(
        &self,
        vehicle: usize,
        route: &[usize],
        anchor: Option<i64>,
    ) -> Option<Vec<i64>> {
        let nodes = self.route_nodes(vehicle, route);
        let mut cumuls = vec![0i64; nodes.len()];

        let (_, end_hi) = self.cumul_window(nodes[nodes.len() - 1]);
        let mut latest = match anchor {
            Some(anchor) => end_hi.min(anchor),
            None => end_hi,
        };
        cumuls[nodes.len() - 1] = latest;

        for i in (0..nodes.len() - 1).rev() {
            let (lo, hi) = self.cumul_window(nodes[i]);
            latest = hi.min(latest - self.folded(nodes[i], nodes[i + 1]));
            if latest < lo {
                return None;
            }
            cumuls[i] = latest;
        }

        Some(cumuls)
    }

    /// Capacity, eligibility, and time-window feasibility of a route.
    pub fn route_feasible(&self, vehicle: usize, route: &[usize]) -> bool {
        if route
            .iter()
            .any(|&node| !self.vehicle_allowed(vehicle, node))
        {
            return false;
        }
        if self.route_load(route) > self.view.capacities[vehicle] {
            return false;
        }
        self.earliest_cumuls(vehicle, route).is_some()
    }

    /// Route time span on the tightest schedule: earliest end, latest start.
    pub fn route_span(&self, vehicle: usize, route: &[usize]) -> Option<i64> {
        let earliest = self.earliest_cumuls(vehicle, route)?;
        let end = *earliest.last().expect("route has an end");
        let latest = self.latest_cumuls(vehicle, route, Some(end))?;
        Some(end - latest[0])
    }

    /// Sum of folded arc costs along the route.
    pub fn route_arc_cost(&self, vehicle: usize, route: &[usize]) -> i64 {
        let nodes = self.route_nodes(vehicle, route);
        nodes.windows(2).map(|w| self.folded(w[0], w[1])).sum()
    }

    /// Arc costs plus the span cost of this vehicle, or `None` when the route
    /// is time-infeasible.
    pub fn route_cost(&self, vehicle: usize, route: &[usize]) -> Option<i64> {
        let span = self.route_span(vehicle, route)?;
        Some(self.route_arc_cost(vehicle, route) + self.view.span_coefficients[vehicle] * span)
    }

    /// Total objective of an assignment: route costs plus drop penalties.
    pub fn objective(&self, routes: &[Vec<usize>], dropped: &[usize]) -> Option<i64> {
        let mut total = 0i64;
        for (vehicle, route) in routes.iter().enumerate() {
            total += self.route_cost(vehicle, route)?;
        }
        total += dropped.iter().map(|&n| self.penalty(n)).sum::<i64>();
        Some(total)
    }

    /// Order nodes whose window no eligible vehicle can reach directly from
    /// its start; used for infeasibility diagnostics.
    pub fn unreachable_orders(&self) -> Vec<usize> {
        self.view
            .order_nodes()
            .filter(|&node| {
                !self.view.eligibility[node].is_empty()
                    && self.view.eligibility[node]
                        .iter()
                        .all(|&v| self.earliest_cumuls(v, &[node]).is_none())
            })
            .collect()
    }
}
