//! Volume forecasting models for GasBal
//!
//! Turns trained per-valve artifacts into callable forecasting models behind
//! one trait, so the ensemble never needs to know which kind it is calling.
//!
//! Modules:
//! - `types`: `ModelKind`, the closed set of supported model families
//! - `features`: `FeatureSet` and projection onto ordered model inputs
//! - `model`: the `ForecastModel` trait and `decode_model` dispatch
//! - `calendar`: trend + Fourier seasonality model (`prophet`)
//! - `gbdt`: boosted trees (`lightgbm`, `catboost`)
//! - `forest`: bagged trees (`randomforest`)
//! - `sequence`: LSTM over a lookback window (`lstm`)
//! - `hybrid`: calendar trend plus sequence residual (`hybrid`)
//! - `serde_canon`: canonical JSON and blake3 artifact digests

pub mod calendar;
pub mod errors;
pub mod features;
pub mod forest;
pub mod gbdt;
pub mod hybrid;
pub mod model;
pub mod sequence;
pub mod serde_canon;
pub mod types;

pub use errors::{AiCoreError, PredictionError};
pub use features::{FeatureSet, FeatureVector};
pub use model::{decode_model, ForecastModel};
pub use serde_canon::{digest_hex, hash_canonical_hex, to_canonical_json};
pub use types::{ModelKind, UnknownModelKind};

/// Crate version string for metadata and reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
