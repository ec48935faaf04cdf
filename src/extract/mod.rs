//! Ingestion of marketplace artifacts into the canonical store.
//!
//! Every artifact is either installed, replaced (with `force`), or skipped.
//! Writes go through [`CanonicalStore::ingest`], so an interrupted run never
//! leaves a half-written artifact under its real name.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::CommandDocument;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutil;
use crate::store::{CanonicalStore, Ingested, MarketplaceRecord};
use crate::types::ArtifactKind;

mod discovery;

pub use discovery::{ArtifactLayout, DiscoveredArtifact, discover};

/// Why an artifact was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The canonical store already has an artifact with this kind and name.
    AlreadyExists,
    /// An earlier artifact in the same run had this kind and name.
    DuplicateInSource,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already-exists"),
            Self::DuplicateInSource => write!(f, "duplicate-in-source"),
        }
    }
}

/// Result of ingesting one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Installed,
    Replaced,
    Skipped(SkipReason),
    Failed(String),
}

impl ExtractOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label for tables.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Installed => "installed".to_string(),
            Self::Replaced => "replaced".to_string(),
            Self::Skipped(reason) => format!("skipped: {reason}"),
            Self::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

/// One row of an [`ExtractionReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionItem {
    pub kind: ArtifactKind,
    pub name: String,
    /// Plugin that provided the artifact, if any.
    pub plugin: Option<String>,
    /// Location inside the marketplace.
    pub source: PathBuf,
    pub outcome: ExtractOutcome,
}

/// Per-artifact outcomes of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Marketplace the artifacts came from.
    pub marketplace: String,
    pub items: Vec<ExtractionItem>,
}

impl ExtractionReport {
    /// Returns `true` if any artifact failed. Skips are not failures.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|item| item.outcome.is_failure())
    }

    /// Number of items whose outcome matches `predicate`.
    pub fn count(&self, predicate: impl Fn(&ExtractOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| predicate(&item.outcome)).count()
    }
}

/// Copies artifacts from marketplace checkouts into the canonical store.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionEngine<'a> {
    store: &'a CanonicalStore,
}

impl<'a> ExtractionEngine<'a> {
    #[must_use]
    pub fn new(store: &'a CanonicalStore) -> Self {
        Self { store }
    }

    /// Extracts every artifact of a tracked marketplace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the clone is missing, or an I/O error
    /// if its directories cannot be listed. Per-artifact failures are
    /// recorded in the report instead.
    pub fn extract(&self, record: &MarketplaceRecord, force: bool) -> Result<ExtractionReport> {
        self.extract_from(&record.name, &record.path, force)
    }

    /// Extracts every artifact found under `root`.
    pub fn extract_from(&self, label: &str, root: &Path, force: bool) -> Result<ExtractionReport> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!(
                "marketplace checkout {}",
                root.display()
            )));
        }
        self.store.ensure_layout()?;

        let mut report = ExtractionReport {
            marketplace: label.to_string(),
            items: Vec::new(),
        };
        let mut seen = HashSet::new();

        for artifact in discover(root)? {
            let outcome = if seen.insert((artifact.kind, artifact.name.clone())) {
                match self.ingest(&artifact, force) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            kind = %artifact.kind,
                            name = %artifact.name,
                            error = %e,
                            "failed to extract artifact"
                        );
                        ExtractOutcome::Failed(e.to_string())
                    }
                }
            } else {
                debug!(kind = %artifact.kind, name = %artifact.name, "duplicate in source");
                ExtractOutcome::Skipped(SkipReason::DuplicateInSource)
            };

            report.items.push(ExtractionItem {
                kind: artifact.kind,
                name: artifact.name,
                plugin: artifact.plugin,
                source: artifact.path,
                outcome,
            });
        }

        info!(
            marketplace = label,
            installed = report.count(|o| *o == ExtractOutcome::Installed),
            replaced = report.count(|o| *o == ExtractOutcome::Replaced),
            skipped = report.count(|o| matches!(o, ExtractOutcome::Skipped(_))),
            "extraction finished"
        );
        Ok(report)
    }

    fn ingest(&self, artifact: &DiscoveredArtifact, force: bool) -> Result<ExtractOutcome> {
        crate::store::validate_name(&artifact.name)?;

        let existing = self.store.find_artifact(artifact.kind, &artifact.name);
        if existing.is_some() && !force {
            debug!(kind = %artifact.kind, name = %artifact.name, "already in store");
            return Ok(ExtractOutcome::Skipped(SkipReason::AlreadyExists));
        }

        let dest = self.destination(artifact);
        let ingested = match artifact.kind {
            ArtifactKind::Command => {
                let content = fs::read_to_string(&artifact.path).at(&artifact.path)?;
                let normalized = CommandDocument::parse(&content)?.to_markdown()?;
                self.store.ingest(&dest, true, |staged| {
                    fs::write(staged, normalized.as_bytes()).at(staged)
                })?
            }
            _ => self
                .store
                .ingest(&dest, true, |staged| fsutil::copy_entry(&artifact.path, staged))?,
        };

        // A replacement with a different shape (file vs directory) leaves
        // the old entry under another path.
        if let Some(old) = existing
            && old != dest
        {
            fsutil::remove_entry(&old)?;
            return Ok(ExtractOutcome::Replaced);
        }

        Ok(match ingested {
            Ingested::Installed => ExtractOutcome::Installed,
            Ingested::Replaced => ExtractOutcome::Replaced,
        })
    }

    fn destination(&self, artifact: &DiscoveredArtifact) -> PathBuf {
        let dir = self.store.kind_dir(artifact.kind);
        match (artifact.kind, artifact.layout) {
            (ArtifactKind::Command, _) => dir.join(format!("{}.md", artifact.name)),
            (_, ArtifactLayout::Directory) => dir.join(&artifact.name),
            (_, ArtifactLayout::File) => dir.join(
                artifact
                    .path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(&artifact.name)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn marketplace(dir: &Path) -> PathBuf {
        let root = dir.join("repo");
        touch(&root.join("skills/foo/SKILL.md"), "---\nname: foo\n---\nFoo");
        touch(&root.join("skills/foo/scripts/run.sh"), "echo foo");
        touch(
            &root.join("commands/bar.md"),
            "---\r\ndescription: Bar\r\n---\r\nBar $ARGUMENTS\r\n",
        );
        touch(&root.join("plugins/p1/agents/reviewer.md"), "Review");
        touch(&root.join("plugins/p1/hooks/guard/hook.sh"), "#!/bin/sh");
        root
    }

    fn store(dir: &Path) -> CanonicalStore {
        CanonicalStore::new(dir.join(".agent"))
    }

    #[test]
    fn extracts_every_kind_into_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = marketplace(dir.path());
        let store = store(dir.path());

        let report = ExtractionEngine::new(&store)
            .extract_from("repo", &root, false)
            .unwrap();

        assert_eq!(report.items.len(), 4);
        assert!(report
            .items
            .iter()
            .all(|item| item.outcome == ExtractOutcome::Installed));

        let skills = store.kind_dir(ArtifactKind::Skill);
        assert!(skills.join("foo/SKILL.md").is_file());
        assert!(skills.join("foo/scripts/run.sh").is_file());
        assert!(store.kind_dir(ArtifactKind::Agent).join("reviewer.md").is_file());
        assert!(store.kind_dir(ArtifactKind::Hook).join("guard/hook.sh").is_file());

        let bar = fs::read_to_string(store.kind_dir(ArtifactKind::Command).join("bar.md")).unwrap();
        assert_eq!(bar, "---\ndescription: Bar\n---\nBar $ARGUMENTS\n");
    }

    #[test]
    fn second_extraction_without_force_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = marketplace(dir.path());
        let store = store(dir.path());
        let engine = ExtractionEngine::new(&store);
        engine.extract_from("repo", &root, false).unwrap();

        let skill_md = store.kind_dir(ArtifactKind::Skill).join("foo/SKILL.md");
        fs::write(&skill_md, "local edit").unwrap();
        touch(&root.join("skills/foo/SKILL.md"), "upstream change");

        let report = engine.extract_from("repo", &root, false).unwrap();

        assert!(report
            .items
            .iter()
            .all(|item| item.outcome == ExtractOutcome::Skipped(SkipReason::AlreadyExists)));
        assert!(!report.has_failures());
        assert_eq!(fs::read_to_string(&skill_md).unwrap(), "local edit");
    }

    #[test]
    fn force_replaces_the_whole_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let root = marketplace(dir.path());
        let store = store(dir.path());
        let engine = ExtractionEngine::new(&store);
        engine.extract_from("repo", &root, false).unwrap();

        let skill = store.kind_dir(ArtifactKind::Skill).join("foo");
        fs::write(skill.join("stray.txt"), "local only").unwrap();
        touch(&root.join("skills/foo/SKILL.md"), "upstream change");

        let report = engine.extract_from("repo", &root, true).unwrap();

        assert!(report
            .items
            .iter()
            .all(|item| item.outcome == ExtractOutcome::Replaced));
        assert_eq!(
            fs::read_to_string(skill.join("SKILL.md")).unwrap(),
            "upstream change"
        );
        assert!(!skill.join("stray.txt").exists());
    }

    #[test]
    fn first_occurrence_wins_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        touch(&root.join("skills/dup/SKILL.md"), "top-level");
        touch(&root.join("plugins/a/skills/dup/SKILL.md"), "plugin a");
        touch(&root.join("plugins/b/skills/dup/SKILL.md"), "plugin b");
        let store = store(dir.path());

        let report = ExtractionEngine::new(&store)
            .extract_from("repo", &root, true)
            .unwrap();

        let outcomes: Vec<_> = report.items.iter().map(|i| i.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                ExtractOutcome::Installed,
                ExtractOutcome::Skipped(SkipReason::DuplicateInSource),
                ExtractOutcome::Skipped(SkipReason::DuplicateInSource),
            ]
        );
        assert_eq!(
            fs::read_to_string(store.kind_dir(ArtifactKind::Skill).join("dup/SKILL.md")).unwrap(),
            "top-level"
        );
    }

    #[test]
    fn broken_command_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        touch(&root.join("commands/bad.md"), "---\ndescription: [oops\n---\nx");
        touch(&root.join("commands/good.md"), "Good $ARGUMENTS");
        let store = store(dir.path());

        let report = ExtractionEngine::new(&store)
            .extract_from("repo", &root, false)
            .unwrap();

        assert!(report.has_failures());
        assert!(matches!(report.items[0].outcome, ExtractOutcome::Failed(_)));
        assert_eq!(report.items[1].outcome, ExtractOutcome::Installed);
        assert_eq!(
            store.list_artifacts(ArtifactKind::Command).unwrap(),
            vec!["good".to_string()]
        );
    }

    #[test]
    fn missing_checkout_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let result = ExtractionEngine::new(&store).extract_from("gone", &dir.path().join("gone"), false);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
