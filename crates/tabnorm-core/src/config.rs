//! Normalizer configuration file (JSON)

use crate::columns::ColumnOptions;
use crate::error::{Error, Result};
use crate::process::MergeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything `normalize` needs besides the data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Detect merge keys and preserve fields that are not given explicitly
    pub auto_merge: bool,
    pub merge: MergeConfig,
    pub columns: ColumnOptions,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            auto_merge: true,
            merge: MergeConfig::default(),
            columns: ColumnOptions::default(),
        }
    }
}

impl NormalizeConfig {
    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that can only be typos
    pub fn validate(&self) -> Result<()> {
        let blank = |fields: &Option<Vec<String>>| {
            fields
                .as_ref()
                .is_some_and(|f| f.iter().any(|name| name.trim().is_empty()))
        };

        if blank(&self.merge.merge_key_fields) {
            return Err(Error::InvalidConfig("merge_key_fields contains a blank name".to_string()));
        }
        if blank(&self.merge.preserve_fields) {
            return Err(Error::InvalidConfig("preserve_fields contains a blank name".to_string()));
        }
        if let Some(identity) = &self.merge.identity_field {
            if identity.trim().is_empty() {
                return Err(Error::InvalidConfig("identity_field is blank".to_string()));
            }
        }
        Ok(())
    }

    /// A filled-in example used by `init-config`
    pub fn template() -> Self {
        Self {
            auto_merge: true,
            merge: MergeConfig {
                merge_key_fields: Some(vec!["id".to_string()]),
                preserve_fields: Some(vec!["name".to_string()]),
                identity_field: Some("id".to_string()),
            },
            columns: ColumnOptions {
                hidden: vec![crate::source::GROUP_FIELD.to_string()],
                ..Default::default()
            },
        }
    }
}
