//! AI Service error types

use gasbal_ai_registry::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

/// Tabular data store errors
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid table name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("Table {table}, row {row}: column {column} is not a number ({value:?})")]
    NotNumeric {
        table: String,
        row: usize,
        column: String,
        value: String,
    },
}

/// Reliability scorer errors
#[derive(Error, Debug)]
pub enum ScoreError {
    /// Not enough (actual, predicted) pairs for any model of the entity
    #[error("Insufficient history for {entity}: need {required} pairs, best model has {available}")]
    InsufficientData {
        entity: String,
        required: usize,
        available: usize,
    },

    /// History source failed
    #[error("History unavailable: {0}")]
    History(#[from] TableError),
}

/// Ensemble configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid weight for {key}: {value} (must be finite and in (0, 1])")]
pub struct WeightError {
    pub key: String,
    pub value: f64,
}

/// AI Service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Scoring error: {0}")]
    Score(#[from] ScoreError),

    #[error("Data error: {0}")]
    Table(#[from] TableError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid ensemble weight: {0}")]
    Weight(#[from] WeightError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Config(format!("Failed to parse config file: {err}"))
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
