//! Engine configuration.
//!
//! Values are layered, highest priority first:
//!
//! 1. Runtime overrides (fields set on the loaded struct)
//! 2. Environment variables (`SPATIOGRAPH_*`, `__` separates sections,
//!    e.g. `SPATIOGRAPH_POOL__SIZE=8`)
//! 3. Configuration file (`spatiograph.toml`)
//! 4. Default values
//!
//! ```rust
//! use spatiograph::EngineConfig;
//!
//! let cfg = EngineConfig::from_toml(
//!     r#"
//!     prefix = "http://example.org/regions#"
//!     [pool]
//!     size = 2
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(cfg.pool.size, 2);
//! assert!(cfg.auto_create_collections);
//! ```

use std::{collections::BTreeMap, path::Path, path::PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, SpatioGraphError},
    vocabulary,
};

pub const DEFAULT_CONFIG_FILE: &str = "spatiograph.toml";
pub const ENV_PREFIX: &str = "SPATIOGRAPH_";

/// SQLite store options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Register the spatial SQL functions. When off, spatial queries fail
    /// with an unsupported-feature error.
    pub spatial: bool,
    pub busy_timeout_ms: u64,
    pub pragma_settings: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            spatial: true,
            busy_timeout_ms: 5_000,
            pragma_settings: BTreeMap::new(),
        }
    }
}

/// Worker pool options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub name: String,
    /// Maximum number of operations running store calls at once.
    pub size: usize,
    /// Rows buffered between a streaming query and its consumer.
    pub stream_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "collection-pool".to_string(),
            size: 4,
            stream_buffer: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace that short identifiers are resolved against.
    pub prefix: String,
    /// Create a missing collection on its first membership write instead of
    /// requiring it to exist.
    pub auto_create_collections: bool,
    pub pool: PoolConfig,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: vocabulary::ONTOLOGY.to_string(),
            auto_create_collections: true,
            pool: PoolConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads `spatiograph.toml` from the working directory (if present) and
    /// the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let figment =
            Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::string(toml_str));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let cfg: EngineConfig = figment
            .extract()
            .map_err(|e| SpatioGraphError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(SpatioGraphError::config("prefix must be set"));
        }
        if self.pool.size == 0 {
            return Err(SpatioGraphError::config("pool.size must be at least 1"));
        }
        if self.pool.stream_buffer == 0 {
            return Err(SpatioGraphError::config(
                "pool.stream_buffer must be at least 1",
            ));
        }
        if self.pool.name.trim().is_empty() {
            return Err(SpatioGraphError::config("pool.name must be set"));
        }
        Ok(())
    }
}
