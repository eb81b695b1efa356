//! YAML configuration for assembling a resolution stack.
//!
//! A config file names the search backend, the resolver settings, and any
//! similarity profiles to register at startup, and can be turned into a
//! running [`ResolutionStack`] with [`DoppelConfig::build`].
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "customer-dedup"
//!
//! backend:
//!   kind: memory
//!
//! resolver:
//!   default_index: entities
//!   sweep_threshold: 20
//!   fallback_fuzziness: auto
//!
//! profiles:
//!   Person:
//!     index: entities
//!     rules:
//!       - name: firstName
//!         type: text
//!       - name: lastName
//!         type: text
//!         boost: 2.0
//!       - name: ssn
//!         type: keyword
//!         boost: 3.0
//! ```
//!
//! Top-level keys are snake_case; profile bodies use the same camelCase
//! wire format accepted by the profile registry and override payloads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use profile::{JsonFileStore, MemoryProfileStore, ProfileError, ProfileStore, SimilarityProfile};
use resolver::ResolverConfig;
use search::{BackendConfig, Fuzziness, SearchError};

use crate::ResolutionStack;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("backend setup failed: {0}")]
    Backend(#[from] SearchError),

    #[error("profile registration failed: {0}")]
    Profile(#[from] ProfileError),
}

/// Top-level YAML configuration for a resolution stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DoppelConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Search backend configuration
    #[serde(default)]
    pub backend: BackendYamlConfig,

    /// Resolver configuration
    #[serde(default)]
    pub resolver: ResolverYamlConfig,

    /// Path of a JSON profile store; profiles stay in process memory
    /// when unset
    #[serde(default)]
    pub profile_store: Option<String>,

    /// Profiles to register at startup, keyed by entity type
    #[serde(default)]
    pub profiles: HashMap<String, SimilarityProfile>,
}

impl DoppelConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: DoppelConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigLoadError> {
        // Check version
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.backend.validate()?;
        self.resolver.validate()?;

        Ok(())
    }

    /// Build the configured stack: backend, profile store, and resolver,
    /// with every listed profile registered.
    pub fn build(&self) -> Result<ResolutionStack, ConfigLoadError> {
        let backend = self.backend.to_backend_config().build()?;
        let store: Arc<dyn ProfileStore> = match &self.profile_store {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryProfileStore::new()),
        };
        let stack = crate::stack_with(backend, store, self.resolver.to_resolver_config());
        for (entity_type, profile) in &self.profiles {
            stack.registry.put(entity_type, profile.clone())?;
        }
        Ok(stack)
    }
}

impl Default for DoppelConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            backend: BackendYamlConfig::default(),
            resolver: ResolverYamlConfig::default(),
            profile_store: None,
            profiles: HashMap::new(),
        }
    }
}

/// Search backend YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendYamlConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// Base URL of the search service, required when kind is "http"
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_kinds = ["memory", "http"];
        if !valid_kinds.contains(&self.kind.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "backend.kind must be one of: {valid_kinds:?}, got '{}'",
                self.kind
            )));
        }

        if self.kind == "http" && self.url.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigLoadError::Validation(
                "backend.url is required when kind is 'http'".to_string(),
            ));
        }

        Ok(())
    }

    fn to_backend_config(&self) -> BackendConfig {
        match self.kind.as_str() {
            "http" => BackendConfig::Http {
                url: self.url.clone().unwrap_or_default(),
                timeout_secs: self.timeout_secs,
            },
            _ => BackendConfig::Memory,
        }
    }
}

impl Default for BackendYamlConfig {
    fn default() -> Self {
        Self {
            kind: "memory".to_string(),
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Resolver YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverYamlConfig {
    /// Index searched when neither profile nor override binds one
    #[serde(default = "default_index_name")]
    pub default_index: String,

    /// Every Nth resolution sweeps all staged residue from the index
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: u32,

    /// Fuzziness of generic fallback matching: "auto" or "min,max"
    #[serde(default = "default_fuzziness")]
    pub fallback_fuzziness: String,
}

impl ResolverYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.default_index.is_empty() {
            return Err(ConfigLoadError::Validation(
                "resolver.default_index must not be empty".to_string(),
            ));
        }
        if self.sweep_threshold == 0 {
            return Err(ConfigLoadError::Validation(
                "resolver.sweep_threshold must be >= 1".to_string(),
            ));
        }
        if Fuzziness::parse(&self.fallback_fuzziness).is_none() {
            return Err(ConfigLoadError::Validation(format!(
                "resolver.fallback_fuzziness must be 'auto' or 'min,max', got '{}'",
                self.fallback_fuzziness
            )));
        }
        Ok(())
    }

    fn to_resolver_config(&self) -> ResolverConfig {
        let fuzziness = Fuzziness::parse(&self.fallback_fuzziness).unwrap_or_default();
        ResolverConfig::new()
            .with_default_index(self.default_index.as_str())
            .with_sweep_threshold(self.sweep_threshold)
            .with_fallback_fuzziness(fuzziness)
    }
}

impl Default for ResolverYamlConfig {
    fn default() -> Self {
        Self {
            default_index: default_index_name(),
            sweep_threshold: default_sweep_threshold(),
            fallback_fuzziness: default_fuzziness(),
        }
    }
}

// Helper functions for serde defaults
fn default_backend_kind() -> String {
    "memory".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_index_name() -> String {
    "entities".to_string()
}
fn default_sweep_threshold() -> u32 {
    20
}
fn default_fuzziness() -> String {
    "auto".to_string()
}
