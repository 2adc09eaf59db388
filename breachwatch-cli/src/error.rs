//! CLI error type.

use breachwatch_core::BreachError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Breach(#[from] BreachError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Failed to write output: {0}")]
    Output(String),
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;
