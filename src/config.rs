//! YAML configuration for the face cache engine.
//!
//! A single file configures vector dimension, similarity calibration, cache
//! behaviour and logging. [`FaceCacheConfig::load`] additionally layers
//! `FACECACHE__SECTION__KEY` environment variables on top of the file.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! vector:
//!   dimension: 512
//!
//! similarity:
//!   offset: 1.1817961
//!   scale: 5.291995557
//!   max_distance: 2.0
//!   calculators:
//!     facenet-v2:
//!       offset: 1.05
//!       scale: 6.0
//!
//! cache:
//!   load_timeout_ms: 30000
//!   health:
//!     required_tenants: ["acme"]
//!     strict: false
//!     warmup_check: true
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use cache::{CacheConfig, HealthConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vector::{Coefficients, SimilarityConfig};

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to assemble layered config: {0}")]
    Layered(#[from] config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FaceCacheConfig {
    /// Configuration format version
    #[serde(default = "default_config_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub vector: VectorYamlConfig,

    #[serde(default)]
    pub similarity: SimilarityYamlConfig,

    #[serde(default)]
    pub cache: CacheYamlConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FaceCacheConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: FaceCacheConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Optional file plus `FACECACHE__*` environment overrides, e.g.
    /// `FACECACHE__CACHE__LOAD_TIMEOUT_MS=5000`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        Self::load_layered(path, config::Environment::with_prefix("FACECACHE"))
    }

    fn load_layered(
        path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(environment.separator("__").try_parsing(true));

        let config: FaceCacheConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.vector.validate()?;
        self.similarity.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.vector.dimension).with_load_timeout(self.cache.load_timeout())
    }

    pub fn similarity_config(&self) -> SimilarityConfig {
        self.similarity.to_similarity_config()
    }

    pub fn health_config(&self) -> HealthConfig {
        self.cache.health.clone()
    }
}

impl Default for FaceCacheConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            vector: VectorYamlConfig::default(),
            similarity: SimilarityYamlConfig::default(),
            cache: CacheYamlConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Embedding vector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorYamlConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl VectorYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.dimension == 0 {
            return Err(ConfigLoadError::Validation(
                "vector.dimension must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VectorYamlConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

/// Distance-to-similarity calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityYamlConfig {
    #[serde(default = "default_offset")]
    pub offset: f64,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// Per calculator-version coefficient overrides
    #[serde(default)]
    pub calculators: HashMap<String, Coefficients>,
}

impl SimilarityYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_similarity_config()
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("similarity: {err}")))
    }

    pub fn to_similarity_config(&self) -> SimilarityConfig {
        let mut config = SimilarityConfig::new()
            .with_default_coefficients(Coefficients::new(self.offset, self.scale))
            .with_max_distance(self.max_distance);
        for (version, coefficients) in &self.calculators {
            config = config.with_calculator(version.clone(), *coefficients);
        }
        config
    }
}

impl Default for SimilarityYamlConfig {
    fn default() -> Self {
        Self {
            offset: default_offset(),
            scale: default_scale(),
            max_distance: default_max_distance(),
            calculators: HashMap::new(),
        }
    }
}

/// Cache behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheYamlConfig {
    /// How long one caller waits for a cold tenant load
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default)]
    pub health: HealthConfig,
}

impl CacheYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.load_timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.load_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.health.required_tenants.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigLoadError::Validation(
                "cache.health.required_tenants cannot contain empty keys".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            health: HealthConfig::default(),
        }
    }
}

/// Log output settings used by [`init_tracing`](crate::init_tracing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `cache=debug,info`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_config_version() -> String {
    "1.0".to_string()
}
fn default_dimension() -> usize {
    512
}
fn default_offset() -> f64 {
    Coefficients::default().offset
}
fn default_scale() -> f64 {
    Coefficients::default().scale
}
fn default_max_distance() -> f64 {
    vector::similarity::UNIT_SPHERE_DIAMETER
}
fn default_load_timeout_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}
