//! `.claude-plugin/marketplace.json` parsing.
//!
//! Only used for display, so parsing is lenient: unknown keys are ignored
//! and every field is optional.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Manifest location relative to a marketplace root.
pub const MANIFEST_PATH: &str = ".claude-plugin/marketplace.json";

/// Where a listed plugin lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    /// GitHub repository reference.
    GitHub {
        #[serde(alias = "repo")]
        github: String,
    },
    /// Direct URL.
    Url { url: String },
    /// Path inside the marketplace repository.
    Relative(String),
}

impl PluginSource {
    /// The reference as written in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::GitHub { github } => github,
            Self::Url { url } => url,
            Self::Relative(path) => path,
        }
    }
}

/// A plugin listed in a marketplace manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestPlugin {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<PluginSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestMetadata {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Option<ManifestMetadata>,
    #[serde(default)]
    plugins: Vec<ManifestPlugin>,
}

/// A parsed marketplace manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketplaceManifest {
    pub name: Option<String>,
    /// Top-level `description`, else `metadata.description`.
    pub description: Option<String>,
    pub plugins: Vec<ManifestPlugin>,
}

impl MarketplaceManifest {
    /// Parses manifest JSON.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content)?;
        let description = raw
            .description
            .or_else(|| raw.metadata.and_then(|m| m.description));
        Ok(Self {
            name: raw.name,
            description,
            plugins: raw.plugins,
        })
    }

    /// Reads the manifest of a marketplace checkout.
    ///
    /// Returns `Ok(None)` when the repository has no manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonParse`] for a malformed manifest.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join(MANIFEST_PATH);
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plugins_with_mixed_sources() {
        let manifest = MarketplaceManifest::parse(
            r#"{
                "name": "tools",
                "owner": {"name": "someone"},
                "metadata": {"description": "Handy tools", "version": "1.0.0"},
                "plugins": [
                    {"name": "fmt", "source": "./plugins/fmt", "description": "Formatter"},
                    {"name": "lint", "source": {"repo": "org/lint"}},
                    {"name": "docs", "source": {"url": "https://example.com/docs.git"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_deref(), Some("tools"));
        assert_eq!(manifest.description.as_deref(), Some("Handy tools"));
        assert_eq!(manifest.plugins.len(), 3);
        assert_eq!(
            manifest.plugins[0].source,
            Some(PluginSource::Relative("./plugins/fmt".to_string()))
        );
        assert_eq!(
            manifest.plugins[1].source.as_ref().map(PluginSource::as_str),
            Some("org/lint")
        );
        assert_eq!(
            manifest.plugins[2].source.as_ref().map(PluginSource::as_str),
            Some("https://example.com/docs.git")
        );
    }

    #[test]
    fn top_level_description_wins() {
        let manifest = MarketplaceManifest::parse(
            r#"{"description": "top", "metadata": {"description": "nested"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.description.as_deref(), Some("top"));
        assert!(manifest.plugins.is_empty());
    }

    #[test]
    fn missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(MarketplaceManifest::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_PATH);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MarketplaceManifest::load(dir.path()),
            Err(Error::JsonParse(_))
        ));
    }
}
