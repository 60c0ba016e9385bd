//! Engine error kinds
//!
//! Dropping orders is not an error; it is the modeled recovery path. Errors
//! here are terminal: bad input, a failed travel-time lookup, or a solver run
//! that ended without an incumbent.

use serde_json::json;
use thiserror::Error;

/// Travel-time oracle failures
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("matrix request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("matrix provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed matrix response: {0}")]
    Malformed(String),
}

/// Terminal engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("no feasible plan (solver status {status}): {diagnostics}")]
    Infeasible { status: i32, diagnostics: String },

    #[error("time budget exhausted before a first solution was found")]
    BudgetExceeded,
}

impl EngineError {
    /// Stable kind discriminant for the user-visible error object.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::Oracle(_) => "OracleError",
            Self::Infeasible { .. } => "InfeasibleModel",
            Self::BudgetExceeded => "BudgetExceeded",
        }
    }

    /// The single error object surfaced to callers instead of a plan.
    pub fn to_object(&self) -> serde_json::Value {
        json!({ "kind": self.kind(), "message": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(EngineError::InvalidInput("x".into()).kind(), "InvalidInput");
        assert_eq!(EngineError::BudgetExceeded.kind(), "BudgetExceeded");
        assert_eq!(
            EngineError::Infeasible { status: 2, diagnostics: "".into() }.kind(),
            "InfeasibleModel"
        );
    }

    #[test]
    fn test_error_object_shape() {
        let err = EngineError::InvalidInput("empty technician list".into());
        let obj = err.to_object();
        assert_eq!(obj["kind"], "InvalidInput");
        assert!(obj["message"]
            .as_str()
            .unwrap()
            .contains("empty technician list"));
    }

    #[test]
    fn test_oracle_error_wraps_into_engine_error() {
        let err: EngineError =
            OracleError::Malformed("row count mismatch".into()).into();
        assert_eq!(err.kind(), "OracleError");
    }
}
