//! Configuration management

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Valhalla matrix endpoint (optional, falls back to haversine estimate
    /// if unavailable)
    pub valhalla_url: Option<String>,

    /// Default wall-clock budget for one solve, in seconds
    pub time_budget_s: u64,
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let valhalla_url = std::env::var("VALHALLA_URL").ok();

        let time_budget_s = match std::env::var("PLAN_TIME_BUDGET_S") {
            Ok(raw) => raw
                .parse()
                .context("PLAN_TIME_BUDGET_S must be an integer number of seconds")?,
            Err(_) => 30,
        };

        Ok(Self {
            valhalla_url,
            time_budget_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: from_env reads every variable, so splitting these cases
    // across parallel tests would race on the process environment.
    #[test]
    fn test_settings_from_env() {
        std::env::remove_var("VALHALLA_URL");
        std::env::remove_var("PLAN_TIME_BUDGET_S");
        let settings = Settings::from_env().unwrap();
        assert!(settings.valhalla_url.is_none());
        assert_eq!(settings.time_budget_s, 30);

        std::env::set_var("VALHALLA_URL", "http://localhost:8002");
        std::env::set_var("PLAN_TIME_BUDGET_S", "45");
        let settings = Settings::from_env().unwrap();
        assert_eq!(
            settings.valhalla_url,
            Some("http://localhost:8002".to_string())
        );
        assert_eq!(settings.time_budget_s, 45);

        std::env::set_var("PLAN_TIME_BUDGET_S", "not-a-number");
        assert!(Settings::from_env().is_err());

        // Cleanup
        std::env::remove_var("VALHALLA_URL");
        std::env::remove_var("PLAN_TIME_BUDGET_S");
    }
}
