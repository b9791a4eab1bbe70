//! GasBal model registry
//!
//! Maps a valve to the forecasting models trained for it. Manifests and
//! artifacts come from an [`ArtifactStore`] (directory tree or in-memory);
//! the [`ModelRegistry`] decodes them lazily and shares the result as an
//! immutable [`EntityModels`].

pub mod errors;
pub mod manifest;
pub mod registry;
pub mod storage;
pub mod types;

pub use errors::{RegistryError, Result, StoreError, StoreResult};
pub use manifest::EntityManifest;
pub use registry::{EntityModels, ModelRegistry};
pub use storage::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use types::{LoadFailure, RegistryConfig, RegistryStats};
