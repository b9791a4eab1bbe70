//! Lazy per-valve model registry
//!
//! Each entity is loaded on first use and cached for the life of the process
//! (or until `invalidate`/`refresh`). Concurrent first callers for the same
//! entity share one load. A kind that fails to load (missing artifact, bad
//! digest, decode error) is recorded and the remaining kinds stay usable.

use crate::errors::{RegistryError, Result, StoreError};
use crate::manifest::EntityManifest;
use crate::storage::ArtifactStore;
use crate::types::{LoadFailure, RegistryConfig, RegistryStats};
use chrono::NaiveDate;
use gasbal_ai_core::{
    decode_model, digest_hex, FeatureSet, ForecastModel, ModelKind, PredictionError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Immutable set of loaded models for one entity
#[derive(Debug)]
pub struct EntityModels {
    manifest: EntityManifest,
    models: BTreeMap<ModelKind, Arc<dyn ForecastModel>>,
    failures: BTreeMap<ModelKind, String>,
}

impl EntityModels {
    pub fn entity(&self) -> &str {
        &self.manifest.entity
    }

    pub fn manifest(&self) -> &EntityManifest {
        &self.manifest
    }

    /// Every kind declared in the manifest, sorted
    pub fn configured(&self) -> BTreeSet<ModelKind> {
        self.manifest.kinds()
    }

    /// Kinds whose artifacts loaded successfully
    pub fn available(&self) -> BTreeSet<ModelKind> {
        self.models.keys().copied().collect()
    }

    pub fn model(&self, kind: ModelKind) -> Option<&Arc<dyn ForecastModel>> {
        self.models.get(&kind)
    }

    pub fn failure(&self, kind: ModelKind) -> Option<&str> {
        self.failures.get(&kind).map(String::as_str)
    }

    pub fn failures(&self) -> Vec<LoadFailure> {
        self.failures
            .iter()
            .map(|(kind, reason)| LoadFailure {
                kind: *kind,
                reason: reason.clone(),
            })
            .collect()
    }

    pub fn required_features(&self, kind: ModelKind) -> Vec<String> {
        self.manifest.features_for(kind).to_vec()
    }

    /// Run one kind, mapping a kind that never loaded to `Unavailable`
    pub fn predict(
        &self,
        kind: ModelKind,
        features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        match self.models.get(&kind) {
            Some(model) => model.predict(features, date),
            None => Err(PredictionError::Unavailable {
                kind,
                reason: self
                    .failures
                    .get(&kind)
                    .cloned()
                    .unwrap_or_else(|| "not configured for this entity".to_string()),
            }),
        }
    }
}

type EntityCell = Arc<OnceCell<Arc<EntityModels>>>;

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicU64,
    cache_hits: AtomicU64,
    timeouts: AtomicU64,
    failed_models: AtomicU64,
}

/// Entity → loaded models cache backed by an artifact store
pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    config: RegistryConfig,
    entities: Mutex<HashMap<String, EntityCell>>,
    counters: Counters,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            entities: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Loaded models for `entity`, using the configured default deadline
    pub async fn entity(&self, entity: &str) -> Result<Arc<EntityModels>> {
        self.entity_with_deadline(entity, self.config.load_timeout())
            .await
    }

    /// Loaded models for `entity`, giving up after `deadline`.
    ///
    /// A load abandoned on timeout leaves the entity uncached; the next
    /// caller starts a fresh load.
    pub async fn entity_with_deadline(
        &self,
        entity: &str,
        deadline: Option<Duration>,
    ) -> Result<Arc<EntityModels>> {
        let cell = self.cell(entity);
        if let Some(models) = cell.get() {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(models.clone());
        }

        let init = cell.get_or_try_init(|| self.load(entity));
        let outcome = match deadline {
            Some(timeout) => match tokio::time::timeout(timeout, init).await {
                Ok(result) => result,
                Err(_) => {
                    self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(entity, ?timeout, "model load exceeded deadline");
                    self.forget_if_unloaded(entity, &cell);
                    return Err(RegistryError::LoadTimeout {
                        entity: entity.to_string(),
                        timeout,
                    });
                }
            },
            None => init.await,
        };

        match outcome {
            Ok(models) => Ok(models.clone()),
            Err(e) => {
                self.forget_if_unloaded(entity, &cell);
                Err(e)
            }
        }
    }

    /// Kinds that loaded successfully for `entity`
    pub async fn list_available_models(&self, entity: &str) -> Result<BTreeSet<ModelKind>> {
        Ok(self.entity(entity).await?.available())
    }

    /// Ordered inputs for `kind`; empty for calendar models
    pub async fn required_features(&self, entity: &str, kind: ModelKind) -> Result<Vec<String>> {
        Ok(self.entity(entity).await?.required_features(kind))
    }

    /// Kinds declared for `entity` that failed to load
    pub async fn load_failures(&self, entity: &str) -> Result<Vec<LoadFailure>> {
        Ok(self.entity(entity).await?.failures())
    }

    /// Entities the backing store knows about, loaded or not
    pub async fn known_entities(&self) -> Result<Vec<String>> {
        Ok(self.store.list_entities().await?)
    }

    /// Entities currently cached, sorted
    pub fn cached_entities(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entities
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop the cached models for one entity; returns whether it was cached
    pub fn invalidate(&self, entity: &str) -> bool {
        let removed = self.entities.lock().remove(entity);
        let was_loaded = removed.map(|cell| cell.initialized()).unwrap_or(false);
        if was_loaded {
            info!(entity, "invalidated cached models");
        }
        was_loaded
    }

    /// Drop every cached entity
    pub fn refresh(&self) {
        let dropped = {
            let mut entities = self.entities.lock();
            let n = entities.len();
            entities.clear();
            n
        };
        info!(dropped, "registry cache cleared");
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            cached_entities: self.cached_entities().len(),
            loads: self.counters.loads.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            failed_models: self.counters.failed_models.load(Ordering::Relaxed),
        }
    }

    fn cell(&self, entity: &str) -> EntityCell {
        self.entities
            .lock()
            .entry(entity.to_string())
            .or_default()
            .clone()
    }

    /// Unknown entities must not accumulate empty cells
    fn forget_if_unloaded(&self, entity: &str, cell: &EntityCell) {
        let mut entities = self.entities.lock();
        if let Some(current) = entities.get(entity) {
            if Arc::ptr_eq(current, cell) && !current.initialized() {
                entities.remove(entity);
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn load(&self, entity: &str) -> Result<Arc<EntityModels>> {
        let mut manifest = match self.store.load_manifest(entity).await {
            Ok(manifest) => manifest,
            Err(StoreError::EntityNotFound(_)) => {
                return Err(RegistryError::EntityNotFound(entity.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if manifest.entity.is_empty() {
            manifest.entity = entity.to_string();
        } else if manifest.entity != entity {
            return Err(RegistryError::InvalidManifest {
                entity: entity.to_string(),
                reason: format!("manifest names entity {:?}", manifest.entity),
            });
        }
        manifest.validate()?;

        let mut models = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for kind in manifest.kinds() {
            match self.load_model(&manifest, kind).await {
                Ok(model) => {
                    models.insert(kind, model);
                }
                Err(e) => {
                    warn!(entity, %kind, error = %e, "model failed to load");
                    failures.insert(kind, e.to_string());
                }
            }
        }

        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        self.counters
            .failed_models
            .fetch_add(failures.len() as u64, Ordering::Relaxed);
        info!(
            entity,
            loaded = models.len(),
            failed = failures.len(),
            "entity models loaded"
        );

        Ok(Arc::new(EntityModels {
            manifest,
            models,
            failures,
        }))
    }

    async fn load_model(
        &self,
        manifest: &EntityManifest,
        kind: ModelKind,
    ) -> Result<Arc<dyn ForecastModel>> {
        let bytes = self.store.load_artifact(&manifest.entity, kind).await?;

        if self.config.verify_hashes {
            if let Some(expected) = manifest.artifact_hash(kind) {
                let actual = digest_hex(&bytes);
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(RegistryError::HashMismatch {
                        entity: manifest.entity.clone(),
                        kind,
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }

        let model = decode_model(kind, &bytes, manifest.features_for(kind).to_vec())?;
        debug!(entity = %manifest.entity, %kind, "model ready");
        Ok(Arc::from(model))
    }
}
