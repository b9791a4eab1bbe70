//! Service configuration
//!
//! Loaded from a TOML file; any section may be omitted. Environment
//! variables prefixed `GASBAL_` override individual values after loading.

use crate::ensemble::EnsembleConfig;
use crate::errors::{Result, ServiceError};
use crate::reliability::ReliabilityConfig;
use gasbal_ai_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub registry: RegistryConfig,
    pub ensemble: EnsembleConfig,
    pub reliability: ReliabilityConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

/// Locations of model artifacts and pipeline tables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub models_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Back-test table under `data_dir`
    pub history_table: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("modelos"),
            data_dir: PathBuf::from("data"),
            history_table: "historico_predicciones.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Outcome of [`ServiceConfig::validate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `GASBAL_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("GASBAL_MODELS_DIR") {
            self.data.models_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("GASBAL_DATA_DIR") {
            self.data.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("GASBAL_HISTORY_TABLE") {
            self.data.history_table = value;
        }
        if let Some(value) = lookup("GASBAL_LOG_LEVEL") {
            self.logging.level = value;
        }

        if let Some(value) = lookup("GASBAL_LOAD_TIMEOUT_MS") {
            match value.trim().parse() {
                Ok(parsed) => self.registry.load_timeout_ms = parsed,
                Err(_) => warn!(value, "ignoring invalid GASBAL_LOAD_TIMEOUT_MS"),
            }
        }
        if let Some(value) = lookup("GASBAL_VERIFY_HASHES") {
            match Self::parse_bool(&value) {
                Some(parsed) => self.registry.verify_hashes = parsed,
                None => warn!(value, "ignoring invalid GASBAL_VERIFY_HASHES"),
            }
        }
        if let Some(value) = lookup("GASBAL_MIN_HISTORY") {
            match value.trim().parse() {
                Ok(parsed) => self.reliability.min_history = parsed,
                Err(_) => warn!(value, "ignoring invalid GASBAL_MIN_HISTORY"),
            }
        }
        if let Some(value) = lookup("GASBAL_FALLBACK_WEIGHT") {
            match value.trim().parse() {
                Ok(parsed) => self.ensemble.fallback_weight = parsed,
                Err(_) => warn!(value, "ignoring invalid GASBAL_FALLBACK_WEIGHT"),
            }
        }
    }

    fn parse_bool(value: &str) -> Option<bool> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("true")
            || value.eq_ignore_ascii_case("yes")
            || value.eq_ignore_ascii_case("y")
            || value == "1"
        {
            Some(true)
        } else if value.eq_ignore_ascii_case("false")
            || value.eq_ignore_ascii_case("no")
            || value.eq_ignore_ascii_case("n")
            || value == "0"
        {
            Some(false)
        } else {
            None
        }
    }

    pub fn validate(&self) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(e) = self.ensemble.validate() {
            errors.push(e.to_string());
        }

        let reliability = &self.reliability;
        if reliability.min_history == 0 {
            errors.push("reliability.min_history must be at least 1".to_string());
        } else if reliability.min_history < 3 {
            warnings.push(format!(
                "reliability.min_history of {} gives unstable scores",
                reliability.min_history
            ));
        }
        if !(reliability.error_at_zero_score.is_finite() && reliability.error_at_zero_score > 0.0) {
            errors.push(format!(
                "reliability.error_at_zero_score must be positive, got {}",
                reliability.error_at_zero_score
            ));
        }
        if !reliability.tiers.is_ordered() {
            errors.push("reliability.tiers must satisfy high >= medium_high >= medium".to_string());
        }

        if self.registry.load_timeout_ms == 0 {
            warnings.push("registry.load_timeout_ms is 0; entity loads have no deadline".to_string());
        }
        if !self.registry.verify_hashes {
            warnings.push("artifact hash verification is disabled".to_string());
        }
        if self.data.history_table.trim().is_empty() {
            errors.push("data.history_table must not be empty".to_string());
        }

        ConfigValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasbal_ai_core::ModelKind;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        let result = config.validate();
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        assert_eq!(config.reliability.min_history, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"
[registry]
load_timeout_ms = 250

[ensemble.default_weights]
lightgbm = 0.5

[ensemble.entity_overrides.VALVULA_1]
catboost = 0.7

[data]
models_dir = "/srv/modelos"
"#,
        )
        .unwrap();

        let config = ServiceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.registry.load_timeout_ms, 250);
        assert!(config.registry.verify_hashes);
        assert_eq!(config.ensemble.default_weights.len(), 1);
        assert_eq!(config.ensemble.weight_for("VALVULA_1", ModelKind::CatBoost), 0.7);
        assert_eq!(config.ensemble.weight_for("VALVULA_2", ModelKind::LightGbm), 0.5);
        assert_eq!(config.data.models_dir, PathBuf::from("/srv/modelos"));
        assert_eq!(config.data.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            ServiceConfig::load_from_file("/nonexistent/gasbal.toml"),
            Err(ServiceError::Config(_))
        ));
        assert!(ServiceConfig::from_toml_str("[ensemble.default_weights]\narima = 0.5\n").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GASBAL_MODELS_DIR", "/tmp/m"),
            ("GASBAL_VERIFY_HASHES", "no"),
            ("GASBAL_LOAD_TIMEOUT_MS", "oops"),
            ("GASBAL_MIN_HISTORY", "5"),
        ]);
        let mut config = ServiceConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data.models_dir, PathBuf::from("/tmp/m"));
        assert!(!config.registry.verify_hashes);
        assert_eq!(config.registry.load_timeout_ms, 5_000);
        assert_eq!(config.reliability.min_history, 5);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(ServiceConfig::parse_bool(" YES "), Some(true));
        assert_eq!(ServiceConfig::parse_bool("0"), Some(false));
        assert_eq!(ServiceConfig::parse_bool("maybe"), None);
    }

    #[test]
    fn test_validate_reports_errors_and_warnings() {
        let mut config = ServiceConfig::default();
        config.ensemble.fallback_weight = 2.0;
        config.reliability.min_history = 1;
        config.reliability.tiers.medium = 90.0;
        config.registry.verify_hashes = false;

        let result = config.validate();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings.len(), 2);
    }
}
