//! Mobilab Engine - routing and scheduling for mobile phlebotomy fleets
//!
//! Computes day plans, answers slack-insertion queries against saved plans,
//! and sweeps randomized service-type mixes for prescriptive analysis.

mod cli;
mod config;
mod error;
mod services;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::EngineError;
use crate::services::engine::{PlanEngine, SolverConfig};
use crate::services::routing::{create_oracle_with_fallback, TravelTimeOracle};
use crate::services::{sweep, vacancy};
use crate::types::{Coordinates, Plan, PlanRequest, Skill, SkillSet};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,mobilab_engine=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = config::Settings::from_env()?;
    let oracle = create_oracle_with_fallback(settings.valhalla_url.clone()).await;

    match cli.command {
        cli::Command::Plan { input, output } => {
            let request = read_json::<PlanRequest>(&input)?;
            let engine =
                PlanEngine::new(SolverConfig::with_budget_seconds(settings.time_budget_s));
            let result = engine.plan(&request, oracle.as_ref()).await;
            finish(result, output.as_deref())
        }
        cli::Command::Vacancies {
            plan,
            lat,
            lng,
            service_minutes,
            skills,
        } => {
            let plan = read_json::<Plan>(&plan)?;
            let required = parse_skills(&skills)?;
            let result = vacancy::find_vacancies(
                &plan,
                Coordinates::new(lat, lng),
                service_minutes,
                &required,
                oracle.as_ref(),
            )
            .await
            .map(|table| table.to_column_json());
            finish(result, None)
        }
        cli::Command::Sweep {
            input,
            regular,
            premium,
            special,
            runs,
            seed,
        } => {
            let request = read_json::<PlanRequest>(&input)?;
            let engine =
                PlanEngine::new(SolverConfig::with_budget_seconds(settings.time_budget_s));
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let result = run_sweep_command(
                &engine,
                &request,
                oracle.as_ref(),
                (regular, premium, special),
                runs,
                &mut rng,
            )
            .await;
            finish(result, None)
        }
    }
}

async fn run_sweep_command(
    engine: &PlanEngine,
    request: &PlanRequest,
    oracle: &dyn TravelTimeOracle,
    mix: (f64, f64, f64),
    runs: usize,
    rng: &mut StdRng,
) -> Result<Vec<sweep::SweepRun>, EngineError> {
    let mix = sweep::ServiceMix::new(mix.0, mix.1, mix.2)?;

    if request.catchments.len() != 1 {
        return Err(EngineError::InvalidInput(
            "sweep runs single-end plans; give exactly one catchment".into(),
        ));
    }

    // One matrix for all runs: the order/coordinate skeleton never changes
    let mut coords = vec![request.catchments[0].coordinates];
    coords.extend(request.technicians.iter().map(|t| t.home));
    coords.extend(request.orders.iter().map(|o| o.coordinates));
    let matrix = oracle.query(&coords, &coords).await?;

    sweep::run_sweep(
        engine,
        &request.orders,
        &request.technicians,
        &request.catchments,
        &matrix,
        mix,
        runs,
        rng,
    )
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_skills(names: &[String]) -> Result<SkillSet> {
    let mut skills = SkillSet::new();
    for name in names {
        let skill =
            Skill::from_name(name).with_context(|| format!("unknown skill '{}'", name))?;
        skills.insert(skill);
    }
    Ok(skills)
}

/// Print the result document: the plan (or table), or the single error
/// object with a non-zero exit.
fn finish<T: serde::Serialize>(
    result: std::result::Result<T, EngineError>,
    output: Option<&Path>,
) -> Result<()> {
    match result {
        Ok(value) => emit(&serde_json::to_value(value)?, output),
        Err(err) => {
            emit(&err.to_object(), output)?;
            std::process::exit(1);
        }
    }
}

fn emit(value: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", text),
    }
    Ok(())
}
