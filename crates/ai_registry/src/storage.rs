//! Artifact storage backends for the model registry
//!
//! Filesystem layout, one directory per valve:
//!
//! ```text
//! <root>/<entity>/manifest.json
//! <root>/<entity>/<kind>.json
//! ```

use crate::errors::{StoreError, StoreResult};
use crate::manifest::EntityManifest;
use async_trait::async_trait;
use gasbal_ai_core::{to_canonical_json, ModelKind};
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

const MANIFEST_FILE: &str = "manifest.json";

/// Source of manifests and serialized model artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Manifest for `entity`; `StoreError::EntityNotFound` when absent
    async fn load_manifest(&self, entity: &str) -> StoreResult<EntityManifest>;

    /// Raw artifact bytes; `StoreError::ArtifactNotFound` when absent
    async fn load_artifact(&self, entity: &str, kind: ModelKind) -> StoreResult<Vec<u8>>;

    /// All entity keys known to the store, sorted
    async fn list_entities(&self) -> StoreResult<Vec<String>>;
}

/// Reject keys that would escape the store root
fn check_entity_key(entity: &str) -> StoreResult<()> {
    let bad = entity.is_empty()
        || entity == "."
        || entity == ".."
        || entity.contains(['/', '\\', '\0']);
    if bad {
        Err(StoreError::InvalidEntityKey(entity.to_string()))
    } else {
        Ok(())
    }
}

/// Directory-backed store
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entity_dir(&self, entity: &str) -> StoreResult<PathBuf> {
        check_entity_key(entity)?;
        Ok(self.root.join(entity))
    }

    /// Write a manifest, creating the entity directory
    pub async fn write_manifest(&self, manifest: &EntityManifest) -> StoreResult<()> {
        let dir = self.entity_dir(&manifest.entity)?;
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), json).await?;
        Ok(())
    }

    /// Write raw artifact bytes for `kind`
    pub async fn write_artifact(
        &self,
        entity: &str,
        kind: ModelKind,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let dir = self.entity_dir(entity)?;
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(format!("{kind}.json")), bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn load_manifest(&self, entity: &str) -> StoreResult<EntityManifest> {
        let path = self.entity_dir(entity)?.join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::EntityNotFound(entity.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(entity, path = %path.display(), "read manifest");
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn load_artifact(&self, entity: &str, kind: ModelKind) -> StoreResult<Vec<u8>> {
        let path = self.entity_dir(entity)?.join(format!("{kind}.json"));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::ArtifactNotFound {
                entity: entity.to_string(),
                kind,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_entities(&self) -> StoreResult<Vec<String>> {
        let mut entities = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entities),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if tokio::fs::try_exists(entry.path().join(MANIFEST_FILE)).await? {
                if let Some(name) = entry.file_name().to_str() {
                    entities.push(name.to_string());
                }
            }
        }
        entities.sort();
        Ok(entities)
    }
}

#[derive(Debug, Default)]
struct MemoryEntity {
    manifest: EntityManifest,
    artifacts: HashMap<ModelKind, Vec<u8>>,
}

/// In-memory store protected by an async-aware lock
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entities: RwLock<HashMap<String, MemoryEntity>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a manifest, keeping already stored artifacts
    pub async fn insert_manifest(&self, manifest: EntityManifest) {
        let key = manifest.entity.clone();
        let mut entities = self.entities.write().await;
        entities.entry(key).or_default().manifest = manifest;
    }

    pub async fn insert_artifact(&self, entity: &str, kind: ModelKind, bytes: Vec<u8>) {
        let mut entities = self.entities.write().await;
        let slot = entities.entry(entity.to_string()).or_insert_with(|| MemoryEntity {
            manifest: EntityManifest::new(entity),
            artifacts: HashMap::new(),
        });
        slot.artifacts.insert(kind, bytes);
    }

    /// Store `params` as canonical JSON and return the bytes written
    pub async fn insert_artifact_json<T: Serialize>(
        &self,
        entity: &str,
        kind: ModelKind,
        params: &T,
    ) -> StoreResult<Vec<u8>> {
        let bytes = to_canonical_json(params)?.into_bytes();
        self.insert_artifact(entity, kind, bytes.clone()).await;
        Ok(bytes)
    }

    pub async fn remove_entity(&self, entity: &str) -> bool {
        self.entities.write().await.remove(entity).is_some()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn load_manifest(&self, entity: &str) -> StoreResult<EntityManifest> {
        self.entities
            .read()
            .await
            .get(entity)
            .map(|e| e.manifest.clone())
            .ok_or_else(|| StoreError::EntityNotFound(entity.to_string()))
    }

    async fn load_artifact(&self, entity: &str, kind: ModelKind) -> StoreResult<Vec<u8>> {
        self.entities
            .read()
            .await
            .get(entity)
            .and_then(|e| e.artifacts.get(&kind).cloned())
            .ok_or_else(|| StoreError::ArtifactNotFound {
                entity: entity.to_string(),
                kind,
            })
    }

    async fn list_entities(&self) -> StoreResult<Vec<String>> {
        let mut entities: Vec<String> = self.entities.read().await.keys().cloned().collect();
        entities.sort();
        Ok(entities)
    }
}
