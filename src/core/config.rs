//! Run configuration from YAML

use crate::execution::CallingStyle;
use crate::store::{validate_collection, Backend, Note};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level run configuration loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pipeline name, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Store to run against
    #[serde(default)]
    pub backend: Backend,

    /// Database file for the sqlite backend
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Collection (table) the notes live in
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Calling style used to drive the chain
    #[serde(default)]
    pub style: CallingStyle,

    /// Note the insert step writes
    #[serde(default)]
    pub note: Note,
}

fn default_name() -> String {
    "notes".to_string()
}

fn default_collection() -> String {
    "notes".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            backend: Backend::default(),
            database: None,
            collection: default_collection(),
            style: CallingStyle::default(),
            note: Note::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        validate_collection(&self.collection)?;

        if self.note.message.is_empty() {
            anyhow::bail!("Note message must not be empty");
        }

        if self.backend == Backend::Sqlite && !cfg!(feature = "sqlite") {
            anyhow::bail!("Backend 'sqlite' requires the 'sqlite' feature");
        }

        if self.backend == Backend::Memory && self.database.is_some() {
            tracing::warn!("'database' is ignored by the memory backend");
        }

        Ok(())
    }
}
