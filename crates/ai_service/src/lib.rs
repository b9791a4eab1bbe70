//! GasBal forecasting service layer
//!
//! Combines the per-valve models held by the registry into a single volume
//! forecast and scores how reliable those forecasts have been:
//! - Weighted ensemble with per-model failure isolation
//! - Error metrics and reliability tiers from back-test history
//! - Tabular data store for pipeline CSV output
//! - TOML configuration with environment overrides

pub mod config;
pub mod data;
pub mod ensemble;
pub mod errors;
pub mod history;
pub mod reliability;
pub mod service;

pub use config::{ConfigValidationResult, DataConfig, LoggingConfig, ServiceConfig};
pub use data::{Cell, Table, TableStore};
pub use ensemble::{
    EnsembleConfig, EnsembleOutcome, EnsemblePredictor, EnsembleResult, SkippedModel,
    WeightedPrediction,
};
pub use errors::{Result, ScoreError, ServiceError, TableError, WeightError};
pub use history::{EntityHistory, HistoryPair, HistoryProvider, InMemoryHistory, TableHistory};
pub use reliability::{
    ErrorMetrics, FleetSummary, ReliabilityConfig, ReliabilityScore, ReliabilityScorer,
    ReliabilityTier, TierThresholds,
};
pub use service::ForecastService;

/// Re-export core model types
pub use gasbal_ai_core::{FeatureSet, ModelKind, PredictionError};

/// Re-export registry types
pub use gasbal_ai_registry::{EntityManifest, ModelRegistry, RegistryConfig, RegistryError};

/// Service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
