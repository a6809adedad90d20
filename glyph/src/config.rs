use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::component::COMPONENT_PREFIX;
use crate::schema::ContainerSchema;

pub const DEFAULT_MAX_CONTAINER_DEPTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Compiler settings, usually loaded from a `glyph.toml`.
///
/// ```toml
/// max-container-depth = 4
///
/// [containers."ui:accordion"]
/// items-field = "panels"
/// content-field = "body"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompilerConfig {
    pub max_container_depth: usize,
    /// Extra container component types, keyed by block type.
    pub containers: BTreeMap<String, ContainerSchema>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            max_container_depth: DEFAULT_MAX_CONTAINER_DEPTH,
            containers: BTreeMap::new(),
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_container_depth == 0 {
            return Err(ConfigError::Invalid(
                "max-container-depth must be at least 1".into(),
            ));
        }
        for (kind, schema) in &self.containers {
            if !kind.starts_with(COMPONENT_PREFIX) || kind.len() == COMPONENT_PREFIX.len() {
                return Err(ConfigError::Invalid(format!(
                    "container type '{}' must look like '{}<name>'",
                    kind, COMPONENT_PREFIX
                )));
            }
            if schema.items_field.is_empty() || schema.content_field.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "container type '{}' needs non-empty items-field and content-field",
                    kind
                )));
            }
        }
        Ok(())
    }
}
