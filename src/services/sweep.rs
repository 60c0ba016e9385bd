//! Prescriptive scenario sweep
//!
//! Re-plans the same coordinate/time skeleton under randomized service-type
//! mixes to show which technician mix the business would actually use, and
//! what it would cost.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::error::EngineError;
use crate::services::engine::PlanEngine;
use crate::types::{top_skill, Catchment, Order, Plan, Skill, Technician};

/// Number of randomized reshuffles per sweep.
pub const DEFAULT_SWEEP_RUNS: usize = 10;

/// Target shares of regular / premium / special orders; must sum to one.
#[derive(Debug, Clone, Copy)]
pub struct ServiceMix {
    pub regular: f64,
    pub premium: f64,
    pub special: f64,
}

impl ServiceMix {
    pub fn new(regular: f64, premium: f64, special: f64) -> Result<Self, EngineError> {
        if regular < 0.0 || premium < 0.0 || special < 0.0 {
            return Err(EngineError::InvalidInput(
                "service mix shares must be non-negative".into(),
            ));
        }
        if ((regular + premium + special) - 1.0).abs() > 1e-6 {
            return Err(EngineError::InvalidInput(format!(
                "service mix shares must sum to 1, got {}",
                regular + premium + special
            )));
        }
        Ok(Self {
            regular,
            premium,
            special,
        })
    }
}

/// Outcome of one reshuffled planning run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRun {
    /// Share of used technicians by top expertise: regular, premium, special.
    pub technician_mix: [f64; 3],
    pub technician_counts: [usize; 3],
    pub total_travel_time: i64,
    /// Hiring cost of the used technicians at the per-skill base rates.
    pub total_cost: i64,
    pub used_technicians: Vec<usize>,
    pub plan: Plan,
}

/// Run the engine `runs` times over shuffled service-type assignments on the
/// same order skeleton and fixed travel-time matrix (single-end mode).
pub fn run_sweep(
    engine: &PlanEngine,
    orders: &[Order],
    technicians: &[Technician],
    catchments: &[Catchment],
    matrix: &[Vec<i64>],
    mix: ServiceMix,
    runs: usize,
    rng: &mut impl Rng,
) -> Result<Vec<SweepRun>, EngineError> {
    let mut service_types = partition_service_types(orders.len(), mix);
    let mut results = Vec::with_capacity(runs);

    for run in 0..runs {
        service_types.shuffle(rng);

        let shuffled: Vec<Order> = orders
            .iter()
            .zip(service_types.iter())
            .map(|(order, &kind)| {
                Order::from_services(
                    order.id,
                    order.coordinates,
                    order.requested_start_min,
                    services_for_type(kind),
                )
            })
            .collect();

        let plan =
            engine.plan_with_matrix(&shuffled, technicians, catchments, matrix.to_vec())?;

        let used_technicians: Vec<usize> = plan
            .routes
            .iter()
            .filter(|r| r.visit_count() > 0)
            .map(|r| r.phlebotomist_index)
            .collect();

        let mut counts = [0usize; 3];
        for &idx in &used_technicians {
            match top_skill(&technicians[idx].expertise) {
                Some(Skill::Special) => counts[2] += 1,
                Some(Skill::Premium) => counts[1] += 1,
                _ => counts[0] += 1,
            }
        }
        let used_total = counts.iter().sum::<usize>();
        let technician_mix = if used_total > 0 {
            [
                counts[0] as f64 / used_total as f64,
                counts[1] as f64 / used_total as f64,
                counts[2] as f64 / used_total as f64,
            ]
        } else {
            [0.0; 3]
        };

        let total_cost = counts[0] as i64 * Skill::Regular.base_cost()
            + counts[1] as i64 * Skill::Premium.base_cost()
            + counts[2] as i64 * Skill::Special.base_cost();

        info!(
            "Sweep run {}/{}: {} technicians used, cost {}, travel {} min",
            run + 1,
            runs,
            used_total,
            total_cost,
            plan.model.total_travel_time
        );

        results.push(SweepRun {
            technician_mix,
            technician_counts: counts,
            total_travel_time: plan.model.total_travel_time,
            total_cost,
            used_technicians,
            plan,
        });
    }

    Ok(results)
}

/// Fixed-count type assignment realizing the mix: regular first, then
/// special, premium fills the remainder. Shuffling supplies the randomness.
fn partition_service_types(count: usize, mix: ServiceMix) -> Vec<u8> {
    let regular = (mix.regular * count as f64).floor() as usize;
    let special = (mix.special * count as f64).floor() as usize;

    let mut types = vec![1u8; count];
    for t in types.iter_mut().take(regular) {
        *t = 0;
    }
    for t in types.iter_mut().skip(regular).take(special) {
        *t = 2;
    }
    types
}

/// Nested service sets: a premium order also books the regular draw, a
/// special order books all three.
fn services_for_type(kind: u8) -> &'static [Skill] {
    match kind {
        0 => &[Skill::Regular],
        1 => &[Skill::Regular, Skill::Premium],
        _ => &[Skill::Regular, Skill::Premium, Skill::Special],
    }
}
