//! The canonical config file (`config.json`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{self, AgentDefinition, DEFAULT_AGENTS};
use crate::error::{Error, Result};
use crate::fsutil;
use crate::types::LinkMode;

/// A tracked marketplace clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceRecord {
    /// Local name, unique among tracked marketplaces.
    pub name: String,
    /// Source URL passed to git.
    pub url: String,
    /// Clone location under `plugins/marketplaces/`.
    pub path: PathBuf,
    /// When the clone was last created or updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

/// Persistent configuration of the canonical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalConfig {
    /// Identifiers of agents that `sync` reconciles.
    #[serde(default)]
    pub enabled_agents: BTreeSet<String>,

    /// Tracked marketplaces, in the order they were added.
    #[serde(default)]
    pub marketplaces: Vec<MarketplaceRecord>,

    /// Preferred link mechanism.
    #[serde(default)]
    pub sync_mode: LinkMode,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            enabled_agents: DEFAULT_AGENTS.iter().map(|id| (*id).to_string()).collect(),
            marketplaces: Vec::new(),
            sync_mode: LinkMode::default(),
        }
    }
}

impl CanonicalConfig {
    /// Loads the config, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptState`] if the file exists but cannot be read
    /// or parsed. No default values are mixed into a broken file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::CorruptState {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| Error::CorruptState {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Writes the config atomically (temporary file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fsutil::write_atomic(path, json.as_bytes())
    }

    /// Looks up a tracked marketplace by name.
    #[must_use]
    pub fn marketplace(&self, name: &str) -> Option<&MarketplaceRecord> {
        self.marketplaces.iter().find(|m| m.name == name)
    }

    /// Splits enabled identifiers into known agents and unknown tokens.
    #[must_use]
    pub fn resolve_enabled(&self) -> (Vec<&'static AgentDefinition>, Vec<String>) {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for id in &self.enabled_agents {
            match agent::lookup(id) {
                Ok(def) => known.push(def),
                Err(_) => unknown.push(id.clone()),
            }
        }
        (known, unknown)
    }

    /// Enables an agent. Returns `false` if it was already enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown identifiers.
    pub fn enable(&mut self, id: &str) -> Result<bool> {
        let def = agent::lookup(id)?;
        Ok(self.enabled_agents.insert(def.id.to_string()))
    }

    /// Disables an agent. Returns `false` if it was not enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown identifiers.
    pub fn disable(&mut self, id: &str) -> Result<bool> {
        let def = agent::lookup(id)?;
        Ok(self.enabled_agents.remove(def.id))
    }
}
