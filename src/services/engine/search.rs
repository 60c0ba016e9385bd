//! Solver driver
//!
//! Path-cheapest-arc construction followed by guided local search under a
//! wall-clock budget. The search keeps a feasible incumbent at all times;
//! orders it cannot place profitably stay dropped and pay their penalty.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::EngineError;

use super::model::RoutingModel;

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Wall-clock budget for one solve
    pub time_budget: Duration,
    /// Guided-local-search rounds without a better incumbent before stopping
    /// ahead of the budget
    pub stall_rounds: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(30),
            stall_rounds: 24,
        }
    }
}

impl SolverConfig {
    /// Fast configuration for interactive use and tests
    pub fn fast() -> Self {
        Self {
            time_budget: Duration::from_secs(2),
            stall_rounds: 8,
        }
    }

    /// Quality configuration for background planning
    pub fn quality() -> Self {
        Self {
            time_budget: Duration::from_secs(60),
            stall_rounds: 64,
        }
    }

    pub fn with_budget_seconds(seconds: u64) -> Self {
        Self {
            time_budget: Duration::from_secs(seconds),
            ..Default::default()
        }
    }
}

/// Terminal state of one solver run, numbered like common CP routing status
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    NotSolved,
    Success,
    Fail,
    FailTimeout,
}

impl SolveStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::NotSolved => 0,
            Self::Success => 1,
            Self::Fail => 2,
            Self::FailTimeout => 3,
        }
    }
}

/// A feasible assignment of orders to vehicles.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Served order nodes per vehicle, in visit order.
    pub routes: Vec<Vec<usize>>,
    /// Dropped order nodes, ascending.
    pub dropped: Vec<usize>,
    pub objective: i64,
    pub status: SolveStatus,
}

/// Runs the search over a built model.
pub struct SolverDriver {
    config: SolverConfig,
}

impl SolverDriver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn solve(&self, model: &RoutingModel) -> Result<Assignment, EngineError> {
        let started = Instant::now();
        let deadline = started + self.config.time_budget;

        self.check_model(model)?;

        if self.config.time_budget.is_zero() {
            return Err(EngineError::BudgetExceeded);
        }

        let (mut routes, mut dropped) = construct_cheapest_arc(model, deadline)?;

        let mut search = Search::new(model);
        let mut best_routes = routes.clone();
        let mut best_dropped = dropped.clone();
        let mut best_objective = model
            .objective(&routes, &dropped)
            .expect("construction yields feasible routes");

        let mut stall = 0u32;
        let mut rounds = 0u32;
        while Instant::now() < deadline && stall < self.config.stall_rounds {
            let improved = search.local_pass(&mut routes, &mut dropped, deadline);

            let objective = model
                .objective(&routes, &dropped)
                .expect("search maintains feasible routes");
            if objective < best_objective {
                best_objective = objective;
                best_routes = routes.clone();
                best_dropped = dropped.clone();
                stall = 0;
            } else if !improved {
                stall += 1;
            }

            if improved {
                continue;
            }

            // Local optimum on the augmented landscape: penalize the most
            // expensive unpunished arcs and keep going. Lambda scales with
            // the routing share of the objective, not the drop penalties.
            let routing_cost =
                objective - dropped.iter().map(|&n| model.penalty(n)).sum::<i64>();
            search.init_lambda(routing_cost, &routes);
            search.penalize(&routes);
            rounds += 1;
        }

        let status = SolveStatus::Success;
        info!(
            "Solved in {} ms: objective {}, {} dropped, {} penalty rounds",
            started.elapsed().as_millis(),
            best_objective,
            best_dropped.len(),
            rounds
        );

        best_dropped.sort_unstable();
        Ok(Assignment {
            routes: best_routes,
            dropped: best_dropped,
            objective: best_objective,
            status,
        })
    }

    /// A model where some vehicle cannot even run its empty start-to-end
    /// route has no feasible assignment at all.
    fn check_model(&self, model: &RoutingModel) -> Result<(), EngineError> {
        let stuck: Vec<usize> = (0..model.num_vehicles())
            .filter(|&v| model.earliest_cumuls(v, &[]).is_none())
            .collect();
        if stuck.is_empty() {
            return Ok(());
        }

        let mut diagnostics = format!(
            "vehicles {:?} cannot reach the end window from their start",
            stuck
        );
        let orphans: Vec<usize> = model
            .view
            .order_nodes()
            .filter(|&n| model.view.eligibility[n].is_empty())
            .collect();
        if !orphans.is_empty() {
            diagnostics.push_str(&format!("; orders {:?} have no eligible vehicle", orphans));
        }
        let unreachable = model.unreachable_orders();
        if !unreachable.is_empty() {
            diagnostics.push_str(&format!(
                "; orders {:?} are unreachable within their windows",
                unreachable
            ));
        }

        Err(EngineError::Infeasible {
            status: SolveStatus::Fail.code(),
            diagnostics,
        })
    }
}

/// First solution: repeatedly append the cheapest feasible arc out of each
/// route's current last node.
fn construct_cheapest_arc(
    model: &RoutingModel,
    deadline: Instant,
) -> Result<(Vec<Vec<usize>>, Vec<usize>), EngineError> {
    let mut unrouted: Vec<usize> = model.view.order_nodes().collect();
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); model.num_vehicles()];

    for vehicle in 0..model.num_vehicles() {
        if Instant::now() > deadline {
            return Err(EngineError::BudgetExceeded);
        }
        let mut last = model.start_node(vehicle);
        loop {
            let mut best: Option<(i64, usize)> = None;
            for &node in &unrouted {
                if !model.vehicle_allowed(vehicle, node) {
                    continue;
                }
                let mut candidate = routes[vehicle].clone();
                candidate.push(node);
                if !model.route_feasible(vehicle, &candidate) {
                    continue;
                }
                let cost = model.folded(last, node);
                if best.map_or(true, |(c, _)| cost < c) {
                    best = Some((cost, node));
                }
            }
            match best {
                Some((_, node)) => {
                    routes[vehicle].push(node);
                    unrouted.retain(|&n| n != node);
                    last = node;
                }
                None => break,
            }
        }
    }

    debug!(
        "Construction placed {} orders, {} left dropped",
        routes.iter().map(|r| r.len()).sum::<usize>(),
        unrouted.len()
    );
    Ok((routes, unrouted))
}

/// Guided local search state: arc penalties and the augmented-cost weight.
struct Search<'a> {
    model: &'a RoutingModel,
    penalties: HashMap<(usize, usize), i64>,
    lambda: i64,
}

impl<'a> Search<'a> {
    fn new(model: &'a RoutingModel) -> Self {
        Self {
            model,
            penalties: HashMap::new(),
            lambda: 0,
        }
    }

    fn arc_penalty(&self, from: usize, to: usize) -> i64 {
        *self.penalties.get(&(from, to)).unwrap_or(&0)
    }

    fn arc_aug(&self, from: usize, to: usize) -> i64 {
        self.model.folded(from, to) + self.lambda * self.arc_penalty(from, to)
    }

    /// Penalty-augmented route cost; `None` when infeasible.
    fn route_aug_cost(&self, vehicle: usize, route: &[usize]) -> Option<i64> {
        if !self.model.route_feasible(vehicle, route) {
            return None;
        }
        let span = self.model.route_span(vehicle, route)?;
        let nodes = self.model.route_nodes(vehicle, route);
        let arcs: i64 = nodes.windows(2).map(|w| self.arc_aug(w[0], w[1])).sum();
        Some(arcs + self.model.view.span_coefficients[vehicle] * span)
    }

    fn init_lambda(&mut self, objective: i64, routes: &[Vec<usize>]) {
        if self.lambda != 0 {
            return;
        }
        let arcs: i64 = routes.iter().map(|r| r.len() as i64 + 1).sum();
        self.lambda = (objective / (20 * arcs.max(1))).max(1);
    }

    /// Bump the penalty of every maximal-utility arc of the incumbent.
    fn penalize(&mut self, routes: &[Vec<usize>]) {
        let mut best_utility = 0f64;
        let mut winners: Vec<(usize, usize)> = Vec::new();

        for (vehicle, route) in routes.iter().enumerate() {
            let nodes = self.model.route_nodes(vehicle, route);
            for w in nodes.windows(2) {
                let arc = (w[0], w[1]);
                let utility =
                    self.model.folded(arc.0, arc.1) as f64 / (1.0 + self.arc_penalty(arc.0, arc.1) as f64);
                if utility > best_utility {
                    best_utility = utility;
                    winners.clear();
                    winners.push(arc);
                } else if utility == best_utility && utility > 0.0 {
                    winners.push(arc);
                }
            }
        }

        for arc in winners {
            *self.penalties.entry(arc).or_insert(0) += 1;
        }
    }

    /// One improvement sweep over all neighborhoods; true when any move was
    /// applied.
    fn local_pass(
        &self,
        routes: &mut Vec<Vec<usize>>,
        dropped: &mut Vec<usize>,
        deadline: Instant,
    ) -> bool {
        let mut improved = false;
        improved |= self.insert_dropped_pass(routes, dropped);
        if Instant::now() > deadline {
            return improved;
        }
        improved |= self.relocate_pass(routes);
        if Instant::now() > deadline {
            return improved;
        }
        improved |= self.swap_pass(routes);
        if Instant::now() > deadline {
            return improved;
        }
        improved |= self.two_opt_pass(routes);
        if Instant::now() > deadline {
            return improved;
        }
        improved |= self.exchange_dropped_pass(routes, dropped);
        improved
    }

    /// Cheapest feasible insertion of a node into one route, by augmented
    /// cost.
    fn best_insertion(&self, vehicle: usize, route: &[usize], node: usize) -> Option<(usize, i64)> {
        if !self.model.vehicle_allowed(vehicle, node) {
            return None;
        }
        let mut best: Option<(usize, i64)> = None;
        for pos in 0..=route.len() {
            let mut candidate = route.to_vec();
            candidate.insert(pos, node);
            if let Some(cost) = self.route_aug_cost(vehicle, &candidate) {
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((pos, cost));
                }
            }
        }
        best
    }

    fn insert_dropped_pass(&self, routes: &mut Vec<Vec<usize>>, dropped: &mut Vec<usize>) -> bool {
        let mut improved = false;
        loop {
            let mut applied = false;
            'node: for d_idx in 0..dropped.len() {
                let node = dropped[d_idx];
                for vehicle in 0..routes.len() {
                    let old = self
                        .route_aug_cost(vehicle, &routes[vehicle])
                        .expect("incumbent routes stay feasible");
                    if let Some((pos, new)) = self.best_insertion(vehicle, &routes[vehicle], node) {
                        let delta = new - old - self.model.penalty(node);
                        if delta < 0 {
                            routes[vehicle].insert(pos, node);
                            dropped.remove(d_idx);
                            applied = true;
                            improved = true;
                            break 'node;
                        }
                    }
                }
            }
            if !applied {
                return improved;
            }
        }
    }

    fn relocate_pass(&self, routes: &mut Vec<Vec<usize>>) -> bool {
        let mut improved = false;
        loop {
            let mut applied = false;
            'scan: for from_v in 0..routes.len() {
                for from_p in 0..routes[from_v].len() {
                    let node = routes[from_v][from_p];
                    let mut source = routes[from_v].clone();
                    source.remove(from_p);
                    let old_from = self
                        .route_aug_cost(from_v, &routes[from_v])
                        .expect("incumbent routes stay feasible");
                    let Some(new_from) = self.route_aug_cost(from_v, &source) else {
                        continue;
                    };

                    for to_v in 0..routes.len() {
                        let (target, old_to) = if to_v == from_v {
                            (source.clone(), 0)
                        } else {
                            (
                                routes[to_v].clone(),
                                self.route_aug_cost(to_v, &routes[to_v])
                                    .expect("incumbent routes stay feasible"),
                            )
                        };
                        let Some((pos, new_to)) = self.best_insertion(to_v, &target, node) else {
                            continue;
                        };
                        let delta = if to_v == from_v {
                            new_to - old_from
                        } else {
                            (new_from - old_from) + (new_to - old_to)
                        };
                        if delta < 0 {
                            let mut placed = target;
                            placed.insert(pos, node);
                            if to_v == from_v {
                                routes[from_v] = placed;
                            } else {
                                routes[from_v] = source.clone();
                                routes[to_v] = placed;
                            }
                            applied = true;
                            improved = true;
                            break 'scan;
                        }
                    }
                }
            }
            if !applied {
                return improved;
            }
        }
    }

    fn swap_pass(&self, routes: &mut Vec<Vec<usize>>) -> bool {
        let mut improved = false;
        loop {
            let mut applied = false;
            'scan: for v1 in 0..routes.len() {
                for v2 in (v1 + 1)..routes.len() {
                    for p1 in 0..routes[v1].len() {
                        for p2 in 0..routes[v2].len() {
                            let mut r1 = routes[v1].clone();
                            let mut r2 = routes[v2].clone();
                            std::mem::swap(&mut r1[p1], &mut r2[p2]);

                            let old = self
                                .route_aug_cost(v1, &routes[v1])
                                .expect("incumbent routes stay feasible")
                                + self
                                    .route_aug_cost(v2, &routes[v2])
                                    .expect("incumbent routes stay feasible");
                            let (Some(c1), Some(c2)) =
                                (self.route_aug_cost(v1, &r1), self.route_aug_cost(v2, &r2))
                            else {
                                continue;
                            };
                            if c1 + c2 < old {
                                routes[v1] = r1;
                                routes[v2] = r2;
                                applied = true;
                                improved = true;
                                break 'scan;
                            }
                        }
                    }
                }
            }
            if !applied {
                return improved;
            }
        }
    }

    fn two_opt_pass(&self, routes: &mut Vec<Vec<usize>>) -> bool {
        let mut improved = false;
        for vehicle in 0..routes.len() {
            loop {
                let n = routes[vehicle].len();
                if n < 2 {
                    break;
                }
                let old = self
                    .route_aug_cost(vehicle, &routes[vehicle])
                    .expect("incumbent routes stay feasible");
                let mut applied = false;
                'scan: for i in 0..n - 1 {
                    for j in i + 1..n {
                        let mut candidate = routes[vehicle].clone();
                        candidate[i..=j].reverse();
                        if let Some(cost) = self.route_aug_cost(vehicle, &candidate) {
                            if cost < old {
                                routes[vehicle] = candidate;
                                applied = true;
                                improved = true;
                                break 'scan;
                            }
                        }
                    }
                }
                if !applied {
                    break;
                }
            }
        }
        improved
    }

    /// Trade a routed order for a dropped one when the penalty difference
    /// pays for it; this is how a higher-revenue order evicts a lower one
    /// from a contested slot.
    fn exchange_dropped_pass(&self, routes: &mut Vec<Vec<usize>>, dropped: &mut Vec<usize>) -> bool {
        let mut improved = false;
        loop {
            let mut applied = false;
            'scan: for d_idx in 0..dropped.len() {
                let incoming = dropped[d_idx];
                for vehicle in 0..routes.len() {
                    for pos in 0..routes[vehicle].len() {
                        let outgoing = routes[vehicle][pos];
                        let mut candidate = routes[vehicle].clone();
                        candidate[pos] = incoming;
                        let old = self
                            .route_aug_cost(vehicle, &routes[vehicle])
                            .expect("incumbent routes stay feasible");
                        let Some(new) = self.route_aug_cost(vehicle, &candidate) else {
                            continue;
                        };
                        let delta = (new - old) + self.model.penalty(outgoing)
                            - self.model.penalty(incoming);
                        if delta < 0 {
                            routes[vehicle] = candidate;
                            dropped[d_idx] = outgoing;
                            dropped.sort_unstable();
                            applied = true;
                            improved = true;
                            break 'scan;
                        }
                    }
                }
            }
            if !applied {
                return improved;
            }
        }
    }
}
