//! The canonical store: the single source of truth under `~/.agent/`.
//!
//! ```text
//! ~/.agent/
//! ├── config.json
//! ├── skills/<name>/SKILL.md
//! ├── agents/<name>/ or agents/<name>.md
//! ├── commands/<name>.md          # normalized command form
//! ├── hooks/<name>/
//! └── plugins/marketplaces/<name>/   # raw git clones
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::fsutil;
use crate::platform::Environment;
use crate::types::{ArtifactKind, Component};

mod config;

pub use config::{CanonicalConfig, MarketplaceRecord};

/// File name of the canonical config.
pub const CONFIG_FILE: &str = "config.json";

/// Whether an ingestion created a new artifact or replaced an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Nothing existed under that name.
    Installed,
    /// An existing artifact was fully replaced.
    Replaced,
}

/// Artifact counts per kind.
pub type ArtifactCounts = BTreeMap<ArtifactKind, usize>;

/// Handle on the canonical store directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalStore {
    root: PathBuf,
}

impl CanonicalStore {
    /// Opens a store rooted at `root`. Nothing is created on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the store configured in the environment.
    #[must_use]
    pub fn from_env(env: &Environment) -> Self {
        Self::new(env.store_root())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Directory holding all artifacts of one kind.
    #[must_use]
    pub fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Directory holding marketplace clones.
    #[must_use]
    pub fn marketplaces_dir(&self) -> PathBuf {
        self.root.join("plugins").join("marketplaces")
    }

    /// Canonical directory behind a link component.
    #[must_use]
    pub fn component_dir(&self, component: Component) -> PathBuf {
        match component.artifact_kind() {
            Some(kind) => self.kind_dir(kind),
            None => self.marketplaces_dir(),
        }
    }

    /// Creates the root, every kind directory and the marketplaces directory,
    /// and clears staging entries abandoned by interrupted runs.
    pub fn ensure_layout(&self) -> Result<()> {
        let mut dirs = vec![self.root.clone(), self.marketplaces_dir()];
        dirs.extend(ArtifactKind::ALL.iter().map(|&k| self.kind_dir(k)));
        for dir in dirs {
            fs::create_dir_all(&dir).at(&dir)?;
            if let Err(e) = fsutil::remove_stale_staging(&dir, fsutil::STALE_STAGING_AGE) {
                warn!(dir = %dir.display(), error = %e, "cannot clear staging entries");
            }
        }
        Ok(())
    }

    /// Loads `config.json`, or defaults if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptState`] if the file is malformed.
    pub fn load_config(&self) -> Result<CanonicalConfig> {
        CanonicalConfig::load(&self.config_path())
    }

    /// Atomically rewrites `config.json`.
    pub fn save_config(&self, config: &CanonicalConfig) -> Result<()> {
        config.save(&self.config_path())
    }

    /// Names of the artifacts of one kind, sorted.
    ///
    /// File artifacts are named by their stem. Hidden entries (staging
    /// directories included) are skipped. A missing kind directory is empty.
    pub fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<String>> {
        let dir = self.kind_dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.at(&dir)?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                names.push(file_name.to_string());
            } else if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Locates an artifact by kind and name.
    #[must_use]
    pub fn find_artifact(&self, kind: ArtifactKind, name: &str) -> Option<PathBuf> {
        let dir = self.kind_dir(kind);
        let as_dir = dir.join(name);
        if as_dir.is_dir() {
            return Some(as_dir);
        }
        fs::read_dir(&dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .find(|path| path.file_stem().and_then(|s| s.to_str()) == Some(name))
    }

    /// Number of artifacts per kind.
    pub fn counts(&self) -> Result<ArtifactCounts> {
        let mut counts = ArtifactCounts::new();
        for &kind in ArtifactKind::ALL {
            counts.insert(kind, self.list_artifacts(kind)?.len());
        }
        Ok(counts)
    }

    /// Writes an artifact to `dest` atomically.
    ///
    /// `write` receives a hidden staging path next to `dest` and must create
    /// the artifact there (a file or a directory). The staged entry is then
    /// renamed into place, replacing an existing artifact only when `force`
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if `dest` exists and `force` is false; the
    /// existing artifact is left untouched.
    pub fn ingest<F>(&self, dest: &Path, force: bool, write: F) -> Result<Ingested>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let existed = fsutil::entry_exists(dest);
        if existed && !force {
            return Err(Error::Conflict(dest.to_path_buf()));
        }

        let staged = fsutil::staging_path(dest, "tmp");
        fsutil::remove_entry(&staged)?;
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        if let Err(e) = write(&staged) {
            let _ = fsutil::remove_entry(&staged);
            return Err(e);
        }
        fsutil::replace_with(&staged, dest)?;

        Ok(if existed {
            Ingested::Replaced
        } else {
            Ingested::Installed
        })
    }

    /// Copies a local skill into the store.
    ///
    /// `source` is a skill directory or its `SKILL.md`. The skill is named
    /// `name`, or after its directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when there is no `SKILL.md`, and
    /// [`Error::AlreadyExists`] when the name is taken and `force` is false.
    pub fn add_skill(&self, source: &Path, name: Option<&str>, force: bool) -> Result<PathBuf> {
        let mut dir = source.to_path_buf();
        if dir.is_file() && dir.file_name().is_some_and(|n| n == "SKILL.md") {
            dir.pop();
        }
        if !dir.join("SKILL.md").is_file() {
            return Err(Error::NotFound(format!("SKILL.md in {}", dir.display())));
        }

        let dir = std::path::absolute(&dir).at(&dir)?;
        let name = match name {
            Some(name) => name.to_string(),
            None => dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("cannot name skill at {}", dir.display()))
                })?,
        };
        validate_name(&name)?;

        let dest = self.kind_dir(ArtifactKind::Skill).join(&name);
        match self.ingest(&dest, force, |staged| fsutil::copy_dir(&dir, staged)) {
            Ok(outcome) => {
                info!(skill = %name, ?outcome, "added skill");
                Ok(dest)
            }
            Err(Error::Conflict(_)) => Err(Error::AlreadyExists(format!("skill '{name}'"))),
            Err(e) => Err(e),
        }
    }

    /// Deletes a skill from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no skill has this name.
    pub fn remove_skill(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = self.kind_dir(ArtifactKind::Skill).join(name);
        if !path.is_dir() {
            return Err(Error::NotFound(format!("skill '{name}'")));
        }
        fsutil::remove_entry(&path)?;
        info!(skill = %name, "removed skill");
        Ok(())
    }
}

/// Rejects names that would escape their kind directory.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(Error::InvalidArgument(format!(
            "invalid artifact name '{name}'"
        )));
    }
    Ok(())
}
