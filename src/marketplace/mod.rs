//! Tracked marketplace repositories.
//!
//! A marketplace is a git repository cloned into
//! `~/.agent/plugins/marketplaces/<name>` and recorded in `config.json`.
//! Clones are staged in a hidden sibling and renamed into place, so a
//! failed clone leaves no directory behind.

use std::fmt;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, IoResultExt, Result};
use crate::fsutil;
use crate::store::{CanonicalStore, MarketplaceRecord, validate_name};

pub mod git;
mod manifest;

pub use git::Git;
pub use manifest::{MANIFEST_PATH, ManifestPlugin, MarketplaceManifest, PluginSource};

/// A user-supplied marketplace source resolved to a git URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// What git clones.
    pub url: String,
    /// Local name before collision handling.
    pub name: String,
    /// Identity used to detect the same repository spelled differently.
    pub key: String,
}

/// Resolves `org/repo`, `http(s)://`, `git@host:org/repo` and local paths.
///
/// Local paths must be absolute, start with `.`, or use `file://`; anything
/// else with a single `/` is GitHub shorthand.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when no name can be derived.
pub fn resolve_source(source: &str) -> Result<ResolvedSource> {
    let source = source.trim().trim_end_matches('/');
    let invalid = || Error::InvalidArgument(format!("unrecognized marketplace source '{source}'"));

    let (url, last) = if source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("file://")
    {
        let parsed = Url::parse(source).map_err(|e| {
            Error::InvalidArgument(format!("invalid marketplace URL '{source}': {e}"))
        })?;
        let last = parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(invalid)?;
        (source.to_string(), last)
    } else if let Some(rest) = source.strip_prefix("git@") {
        let (_, path) = rest.split_once(':').ok_or_else(invalid)?;
        let last = path.rsplit('/').next().ok_or_else(invalid)?.to_string();
        (source.to_string(), last)
    } else if Path::new(source).is_absolute() || source.starts_with('.') {
        let path = std::path::absolute(source).at(source)?;
        let last = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(invalid)?;
        (path.to_string_lossy().into_owned(), last)
    } else {
        let (org, repo) = source.split_once('/').ok_or_else(invalid)?;
        if org.is_empty() || repo.is_empty() || repo.contains('/') || source.contains(' ') {
            return Err(invalid());
        }
        let repo = repo.trim_end_matches(".git");
        (format!("https://github.com/{org}/{repo}.git"), repo.to_string())
    };

    let name = last.trim_end_matches(".git").to_string();
    validate_name(&name)?;
    let key = source_key(&url);
    Ok(ResolvedSource { url, name, key })
}

/// Reduces a clone URL to `host/path` (or a plain path for local sources)
/// without scheme, trailing `/` or `.git`.
///
/// `org/repo`, `https://github.com/org/repo.git` and
/// `git@github.com:org/repo` share one key, as do `/abs/repo` and
/// `file:///abs/repo`. GitHub paths are compared case-insensitively.
#[must_use]
pub fn source_key(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let key = if url.starts_with("file://") {
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.to_file_path().ok())
            .map_or_else(|| url.to_string(), |path| path.to_string_lossy().into_owned())
    } else if url.starts_with("http://") || url.starts_with("https://") {
        match Url::parse(url) {
            Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path()),
            Err(_) => url.to_string(),
        }
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.replacen(':', "/", 1)
    } else {
        url.to_string()
    };

    let key = key.trim_end_matches('/');
    let key = key.strip_suffix(".git").unwrap_or(key).trim_end_matches('/');
    if key.to_ascii_lowercase().starts_with("github.com/") {
        key.to_ascii_lowercase()
    } else {
        key.to_string()
    }
}

/// Result of updating one marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Fetched and reset to the remote head.
    Updated,
    /// The checkout was missing and has been cloned again.
    Recloned,
    Failed(String),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => write!(f, "updated"),
            Self::Recloned => write!(f, "recloned"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome of updating one tracked marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub name: String,
    pub outcome: UpdateOutcome,
}

/// State of a marketplace's manifest, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestState {
    Missing,
    Parsed(MarketplaceManifest),
    Malformed(String),
}

/// A tracked marketplace together with its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceInfo {
    pub record: MarketplaceRecord,
    /// `false` if the checkout directory has gone missing.
    pub present: bool,
    pub manifest: ManifestState,
}

/// Adds, updates, removes and lists marketplace clones.
#[derive(Debug, Clone, Copy)]
pub struct MarketplaceManager<'a> {
    store: &'a CanonicalStore,
    git: Git,
}

impl<'a> MarketplaceManager<'a> {
    #[must_use]
    pub fn new(store: &'a CanonicalStore) -> Self {
        Self { store, git: Git }
    }

    /// Clones a marketplace and starts tracking it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the same source is already
    /// tracked, and [`Error::CloneFailed`] (or [`Error::Network`] on
    /// timeout) if git fails. Nothing is left on disk after a failure.
    pub fn add(&self, source: &str) -> Result<MarketplaceRecord> {
        let resolved = resolve_source(source)?;
        let mut config = self.store.load_config()?;

        if let Some(existing) = config
            .marketplaces
            .iter()
            .find(|m| source_key(&m.url) == resolved.key)
        {
            return Err(Error::AlreadyExists(format!(
                "marketplace '{}' ({})",
                existing.name, existing.url
            )));
        }

        let name = self.unique_name(&resolved.name, &config.marketplaces);
        self.store.ensure_layout()?;
        let dest = self.store.marketplaces_dir().join(&name);

        info!(%name, url = %resolved.url, "cloning marketplace");
        self.clone_into(&resolved.url, &dest)?;

        let record = MarketplaceRecord {
            name,
            url: resolved.url,
            path: dest,
            synced_at: Some(Utc::now()),
        };
        config.marketplaces.push(record.clone());
        self.store.save_config(&config)?;
        Ok(record)
    }

    /// Updates one marketplace, or all of them when `name` is `None`.
    ///
    /// Each record is updated independently; failures are reported per
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not tracked.
    pub fn update(&self, name: Option<&str>) -> Result<Vec<UpdateResult>> {
        let mut config = self.store.load_config()?;
        if let Some(name) = name
            && config.marketplace(name).is_none()
        {
            return Err(Error::NotFound(format!("marketplace '{name}'")));
        }

        let mut results = Vec::new();
        for record in &mut config.marketplaces {
            if name.is_some_and(|n| n != record.name) {
                continue;
            }
            let outcome = self.update_one(record);
            if let UpdateOutcome::Failed(reason) = &outcome {
                warn!(marketplace = %record.name, %reason, "update failed");
            } else {
                record.synced_at = Some(Utc::now());
                info!(marketplace = %record.name, %outcome, "marketplace updated");
            }
            results.push(UpdateResult {
                name: record.name.clone(),
                outcome,
            });
        }

        if !results.is_empty() {
            self.store.save_config(&config)?;
        }
        Ok(results)
    }

    /// Deletes a marketplace clone and stops tracking it.
    ///
    /// Artifacts already extracted from it stay in the canonical store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not tracked.
    pub fn remove(&self, name: &str) -> Result<MarketplaceRecord> {
        let mut config = self.store.load_config()?;
        let index = config
            .marketplaces
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| Error::NotFound(format!("marketplace '{name}'")))?;

        let record = config.marketplaces.remove(index);
        fsutil::remove_entry(&record.path)?;
        self.store.save_config(&config)?;
        info!(marketplace = %record.name, "removed marketplace");
        Ok(record)
    }

    /// Tracked marketplaces with their manifests.
    pub fn list(&self) -> Result<Vec<MarketplaceInfo>> {
        let config = self.store.load_config()?;
        Ok(config
            .marketplaces
            .into_iter()
            .map(|record| {
                let present = record.path.is_dir();
                let manifest = match MarketplaceManifest::load(&record.path) {
                    Ok(Some(manifest)) => ManifestState::Parsed(manifest),
                    Ok(None) => ManifestState::Missing,
                    Err(e) => ManifestState::Malformed(e.to_string()),
                };
                MarketplaceInfo {
                    record,
                    present,
                    manifest,
                }
            })
            .collect())
    }

    fn update_one(&self, record: &MarketplaceRecord) -> UpdateOutcome {
        if record.path.is_dir() {
            return match self.git.update(&record.path) {
                Ok(()) => UpdateOutcome::Updated,
                Err(e) => UpdateOutcome::Failed(e.to_string()),
            };
        }
        match self.clone_into(&record.url, &record.path) {
            Ok(()) => UpdateOutcome::Recloned,
            Err(e) => UpdateOutcome::Failed(e.to_string()),
        }
    }

    fn clone_into(&self, url: &str, dest: &Path) -> Result<()> {
        let staged = fsutil::staging_path(dest, "clone");
        fsutil::remove_entry(&staged)?;
        if let Err(e) = self.git.clone_shallow(url, &staged) {
            let _ = fsutil::remove_entry(&staged);
            return Err(e);
        }
        fsutil::replace_with(&staged, dest)
    }

    /// `base`, or `base-2`, `base-3`, ... if taken by a record or a directory.
    fn unique_name(&self, base: &str, records: &[MarketplaceRecord]) -> String {
        let taken = |name: &str| -> bool {
            records.iter().any(|m| m.name == name)
                || fsutil::entry_exists(&self.store.marketplaces_dir().join(name))
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}
