//! CLI argument parsing for the mobilab-engine binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mobilab-engine",
    about = "Routing and scheduling engine for mobile phlebotomy fleets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute a day plan from a JSON plan request
    Plan {
        /// Path to the plan request JSON
        #[arg(long)]
        input: PathBuf,
        /// Write the plan here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List feasible insertion slots for a prospective order against a saved plan
    Vacancies {
        /// Path to a previously computed plan JSON
        #[arg(long)]
        plan: PathBuf,
        /// Latitude of the prospective order
        #[arg(long)]
        lat: f64,
        /// Longitude of the prospective order
        #[arg(long)]
        lng: f64,
        /// Required service minutes
        #[arg(long, default_value_t = 15)]
        service_minutes: i64,
        /// Required skills, comma separated (regular,premium,special)
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
    },
    /// Re-plan a request under randomized service-type mixes
    Sweep {
        /// Path to the plan request JSON (single catchment)
        #[arg(long)]
        input: PathBuf,
        /// Share of regular orders
        #[arg(long, default_value_t = 0.7)]
        regular: f64,
        /// Share of premium orders
        #[arg(long, default_value_t = 0.2)]
        premium: f64,
        /// Share of special orders
        #[arg(long, default_value_t = 0.1)]
        special: f64,
        /// Number of randomized runs
        #[arg(long, default_value_t = 10)]
        runs: usize,
        /// Seed for reproducible shuffles
        #[arg(long)]
        seed: Option<u64>,
    },
}
