//! Inspection of link targets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::mechanism::LinkMethod;
use crate::error::{IoResultExt, Result};

/// Marker file written into materialized (copied or rendered) targets.
pub const MARKER_FILE: &str = ".agent-plugins.json";

/// Contents of [`MARKER_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedMarker {
    /// Canonical directory the target was materialized from.
    pub source: PathBuf,
    /// Mechanism that produced the target.
    pub method: LinkMethod,
}

impl ManagedMarker {
    /// Writes the marker into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MARKER_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).at(&path)
    }

    /// Reads the marker from `dir`, if present and well-formed.
    #[must_use]
    pub fn read(dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(dir.join(MARKER_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Observed state of an agent path relative to its canonical directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at the target.
    Absent,
    /// The target is a link resolving to the canonical directory.
    Linked,
    /// The target is a link that is broken or points elsewhere.
    StaleLink {
        /// Where the link points.
        points_to: PathBuf,
    },
    /// A real file or directory we did not create.
    Occupied,
    /// A copy or rendering we materialized earlier.
    ManagedCopy {
        /// Mechanism recorded in the marker.
        method: LinkMethod,
    },
}

impl LinkState {
    /// Short label for tables.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Linked => "linked",
            Self::StaleLink { .. } => "stale-link",
            Self::Occupied => "occupied",
            Self::ManagedCopy { .. } => "managed-copy",
        }
    }

    /// Returns `true` if the target currently serves canonical content.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Linked | Self::ManagedCopy { .. })
    }
}

/// Classifies `target` against the canonical `source` without touching it.
#[must_use]
pub fn inspect(target: &Path, source: &Path) -> LinkState {
    let Ok(meta) = fs::symlink_metadata(target) else {
        return LinkState::Absent;
    };

    if meta.file_type().is_symlink() {
        let points_to = fs::read_link(target).unwrap_or_default();
        return match (fs::canonicalize(target), fs::canonicalize(source)) {
            (Ok(resolved), Ok(canonical)) if resolved == canonical => LinkState::Linked,
            _ => LinkState::StaleLink { points_to },
        };
    }

    if meta.is_dir()
        && let Some(marker) = ManagedMarker::read(target)
        && same_path(&marker.source, source)
    {
        return LinkState::ManagedCopy {
            method: marker.method,
        };
    }

    LinkState::Occupied
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!(
        (fs::canonicalize(a), fs::canonicalize(b)),
        (Ok(a), Ok(b)) if a == b
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            inspect(&dir.path().join("target"), dir.path()),
            LinkState::Absent
        );
    }

    #[test]
    fn real_directory_is_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir_all(&target).unwrap();
        assert_eq!(inspect(&target, dir.path()), LinkState::Occupied);
    }

    #[test]
    fn real_file_is_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, "user data").unwrap();
        assert_eq!(inspect(&target, dir.path()), LinkState::Occupied);
    }

    #[test]
    fn marker_with_matching_source_is_managed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("canonical");
        let target = dir.path().join("target");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        ManagedMarker {
            source: source.clone(),
            method: LinkMethod::Copy,
        }
        .write(&target)
        .unwrap();

        assert_eq!(
            inspect(&target, &source),
            LinkState::ManagedCopy {
                method: LinkMethod::Copy
            }
        );
    }

    #[test]
    fn marker_for_other_source_is_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir_all(&target).unwrap();
        ManagedMarker {
            source: dir.path().join("elsewhere"),
            method: LinkMethod::Copy,
        }
        .write(&target)
        .unwrap();

        assert_eq!(
            inspect(&target, &dir.path().join("canonical")),
            LinkState::Occupied
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_linked_or_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("canonical");
        let other = dir.path().join("other");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&other).unwrap();

        let good = dir.path().join("good");
        std::os::unix::fs::symlink(&source, &good).unwrap();
        assert_eq!(inspect(&good, &source), LinkState::Linked);

        let wrong = dir.path().join("wrong");
        std::os::unix::fs::symlink(&other, &wrong).unwrap();
        assert_eq!(
            inspect(&wrong, &source),
            LinkState::StaleLink { points_to: other }
        );

        let broken = dir.path().join("broken");
        std::os::unix::fs::symlink(dir.path().join("gone"), &broken).unwrap();
        assert!(matches!(
            inspect(&broken, &source),
            LinkState::StaleLink { .. }
        ));
    }

    #[test]
    fn labels_match_state_names() {
        assert_eq!(LinkState::Absent.label(), "absent");
        assert_eq!(LinkState::Occupied.label(), "occupied");
        assert!(LinkState::Linked.is_healthy());
        assert!(!LinkState::Occupied.is_healthy());
    }
}
