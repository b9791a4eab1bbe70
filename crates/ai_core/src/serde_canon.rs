//! Canonical JSON encoding and artifact digests
//!
//! Artifacts are stored as JSON. Writing them through the canonical encoder
//! (sorted keys, no whitespace) means the same parameters always produce the
//! same bytes, so the blake3 digest recorded in a valve manifest can be
//! checked when the artifact is loaded.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json_value = serde_json::to_value(value)
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))?;

    serde_json::to_string(&canonicalize_value(&json_value))
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))
}

fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<_, _> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize_value(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize_value).collect())
        }
        other => other.clone(),
    }
}

/// Blake3 digest of raw artifact bytes, hex encoded
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Blake3 digest of the canonical JSON form of `value`, hex encoded
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(digest_hex(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Params {
        slope: f64,
        base_score: f64,
        tags: Vec<String>,
    }

    fn params(slope: f64) -> Params {
        Params {
            slope,
            base_score: 100.0,
            tags: vec!["monthly".to_string()],
        }
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = to_canonical_json(&params(0.5)).unwrap();
        let base = json.find("base_score").unwrap();
        let slope = json.find("slope").unwrap();
        let tags = json.find("tags").unwrap();
        assert!(base < slope && slope < tags);
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_digest_matches_canonical_hash() {
        let p = params(0.5);
        let json = to_canonical_json(&p).unwrap();
        assert_eq!(digest_hex(json.as_bytes()), hash_canonical_hex(&p).unwrap());
        assert_eq!(digest_hex(json.as_bytes()).len(), 64);
    }

    #[test]
    fn test_digest_changes_with_parameters() {
        let a = hash_canonical_hex(&params(0.5)).unwrap();
        let b = hash_canonical_hex(&params(0.75)).unwrap();
        assert_ne!(a, b);
    }
}
