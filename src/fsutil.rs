//! Filesystem helpers for staged, rename-based writes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{IoResultExt, Result};

/// Recursively copies `src` into `dest`, creating `dest`.
///
/// Symlinks inside `src` are followed; the copy contains regular files only.
/// Broken symlinks are skipped with a warning.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).at(dest)?;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.path().is_some_and(is_broken_link) => {
                warn!(path = %e.path().unwrap_or(src).display(), "skipping broken symlink");
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(src).to_path_buf();
                return Err(crate::Error::io(path, e.into()));
            }
        };
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).at(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            fs::copy(entry.path(), &target).at(entry.path())?;
        }
    }
    Ok(())
}

fn is_broken_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
        && fs::metadata(path).is_err()
}

/// Copies a file or a directory tree.
pub fn copy_entry(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir(src, dest)
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::copy(src, dest).at(src)?;
        Ok(())
    }
}

/// Removes whatever is at `path` without following links.
///
/// A symlink (or junction) is removed itself, never its target. Missing
/// paths are not an error.
pub fn remove_entry(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.file_type().is_symlink() {
        // Directory symlinks and junctions on Windows need remove_dir.
        fs::remove_file(path)
            .or_else(|_| fs::remove_dir(path))
            .at(path)
    } else if meta.is_dir() {
        fs::remove_dir_all(path).at(path)
    } else {
        fs::remove_file(path).at(path)
    }
}

/// Returns `true` if anything (including a dangling link) exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Hidden sibling path used to stage content before renaming it into place.
#[must_use]
pub fn staging_path(target: &Path, tag: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{tag}-{}", std::process::id()))
}

/// Age after which a staging entry is considered abandoned by a crashed run.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

const STAGING_TAGS: &[&str] = &["tmp", "clone", "old", "prev"];

/// Returns `true` for names produced by [`staging_path`].
#[must_use]
pub fn is_staging_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('.') else {
        return false;
    };
    let Some((stem, pid)) = rest.rsplit_once('-') else {
        return false;
    };
    if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    stem.rsplit_once('.')
        .is_some_and(|(target, tag)| !target.is_empty() && STAGING_TAGS.contains(&tag))
}

/// Deletes staging entries in `dir` last modified more than `max_age` ago.
///
/// Returns how many were removed. A missing `dir` holds nothing.
pub fn remove_stale_staging(dir: &Path, max_age: Duration) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(crate::Error::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.at(dir)?;
        if !is_staging_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let stale = fs::symlink_metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= max_age);
        if stale {
            remove_entry(&path)?;
            info!(path = %path.display(), "removed abandoned staging entry");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Moves `staged` to `target`, replacing any existing entry.
///
/// The old entry is renamed aside first and deleted only after the new one
/// is in place, so `target` never holds partially written content.
pub fn replace_with(staged: &Path, target: &Path) -> Result<()> {
    if entry_exists(target) {
        let old = staging_path(target, "old");
        remove_entry(&old)?;
        fs::rename(target, &old).at(target)?;
        if let Err(e) = fs::rename(staged, target) {
            let _ = fs::rename(&old, target);
            return Err(crate::Error::io(target, e));
        }
        remove_entry(&old)
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::rename(staged, target).at(target)
    }
}

/// Writes a file through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let tmp = staging_path(path, "tmp");
    fs::write(&tmp, contents).at(&tmp)?;
    fs::rename(&tmp, path).at(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_preserves_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("assets/img")).unwrap();
        fs::write(src.join("SKILL.md"), "# skill").unwrap();
        fs::write(src.join("assets/img/logo.txt"), "logo").unwrap();

        let dest = dir.path().join("dest");
        copy_dir(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("SKILL.md")).unwrap(), "# skill");
        assert_eq!(
            fs::read_to_string(dest.join("assets/img/logo.txt")).unwrap(),
            "logo"
        );
    }

    #[test]
    fn replace_with_swaps_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("skill");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("old.md"), "old").unwrap();

        let staged = staging_path(&target, "tmp");
        fs::create_dir_all(&staged).unwrap();
        fs::write(staged.join("new.md"), "new").unwrap();

        replace_with(&staged, &target).unwrap();

        assert!(target.join("new.md").exists());
        assert!(!target.join("old.md").exists());
        assert!(!staged.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn staging_names_are_recognized() {
        let target = Path::new("/store/skills/foo");
        for tag in ["tmp", "clone", "old", "prev"] {
            let staged = staging_path(target, tag);
            let name = staged.file_name().unwrap().to_str().unwrap();
            assert!(is_staging_name(name), "{name}");
        }
        assert!(!is_staging_name("foo"));
        assert!(!is_staging_name(".git"));
        assert!(!is_staging_name(".foo.tmp-"));
        assert!(!is_staging_name(".foo.backup-20240101T000000Z"));
    }

    #[test]
    fn remove_stale_staging_keeps_fresh_and_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staging_path(&dir.path().join("foo"), "tmp");
        fs::create_dir_all(&staged).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("foo")).unwrap();

        assert_eq!(remove_stale_staging(dir.path(), STALE_STAGING_AGE).unwrap(), 0);
        assert!(staged.exists());

        assert_eq!(remove_stale_staging(dir.path(), Duration::ZERO).unwrap(), 1);
        assert!(!staged.exists());
        assert!(dir.path().join(".git").exists());
        assert!(dir.path().join("foo").exists());

        assert_eq!(
            remove_stale_staging(&dir.path().join("missing"), Duration::ZERO).unwrap(),
            0
        );
    }

    #[cfg(unix)]
    #[test]
    fn copy_dir_skips_broken_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("good")).unwrap();
        fs::write(src.join("good/SKILL.md"), "good").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), src.join("dangling")).unwrap();

        let dest = dir.path().join("dest");
        copy_dir(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("good/SKILL.md")).unwrap(), "good");
        assert!(!entry_exists(&dest.join("dangling")));
    }

    #[test]
    fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/config.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn remove_entry_ignores_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        remove_entry(&dir.path().join("nothing-here")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn remove_entry_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("keep.md"), "keep").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        remove_entry(&link).unwrap();

        assert!(!entry_exists(&link));
        assert!(real.join("keep.md").exists());
    }
}
