//! Ways of making an agent path serve canonical content.
//!
//! Each mechanism either succeeds or reports why it could not. Callers try
//! an ordered list and keep the first success; see [`chain`].

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::state::ManagedMarker;
use crate::command::CommandDocument;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutil;
use crate::types::{CommandFormat, LinkMode};

/// How a link target was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMethod {
    /// Symbolic link.
    Symlink,
    /// Windows directory junction.
    Junction,
    /// Physical copy, refreshed on every sync.
    Copy,
    /// Commands projected into the agent's format, refreshed on every sync.
    Render,
}

impl LinkMethod {
    /// Returns `true` for mechanisms that stay in sync with the canonical
    /// directory by themselves.
    #[must_use]
    pub fn is_link(self) -> bool {
        matches!(self, Self::Symlink | Self::Junction)
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symlink => write!(f, "symlink"),
            Self::Junction => write!(f, "junction"),
            Self::Copy => write!(f, "copy"),
            Self::Render => write!(f, "render"),
        }
    }
}

/// One strategy for materializing `target` from `source`.
///
/// Link mechanisms need an empty `target`. Copy and render stage their
/// output and swap it over whatever is at `target`.
pub trait LinkMechanism {
    /// The method this mechanism produces.
    fn method(&self) -> LinkMethod;

    /// Makes `target` serve the content of `source`.
    fn create(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Symbolic directory link.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkMechanism;

impl LinkMechanism for SymlinkMechanism {
    fn method(&self) -> LinkMethod {
        LinkMethod::Symlink
    }

    #[cfg(unix)]
    fn create(&self, source: &Path, target: &Path) -> Result<()> {
        std::os::unix::fs::symlink(source, target).at(target)
    }

    #[cfg(windows)]
    fn create(&self, source: &Path, target: &Path) -> Result<()> {
        std::os::windows::fs::symlink_dir(source, target).at(target)
    }

    #[cfg(not(any(unix, windows)))]
    fn create(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(Error::Unsupported("symlinks on this platform".to_string()))
    }
}

/// Windows directory junction (reparse point), which needs no privileges.
#[derive(Debug, Clone, Copy, Default)]
pub struct JunctionMechanism;

impl LinkMechanism for JunctionMechanism {
    fn method(&self) -> LinkMethod {
        LinkMethod::Junction
    }

    #[cfg(windows)]
    fn create(&self, source: &Path, target: &Path) -> Result<()> {
        let output = std::process::Command::new("cmd")
            .arg("/C")
            .arg("mklink")
            .arg("/J")
            .arg(target)
            .arg(source)
            .output()
            .at(target)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::io(
                target,
                std::io::Error::other(
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                ),
            ))
        }
    }

    #[cfg(not(windows))]
    fn create(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(Error::Unsupported(
            "directory junctions exist only on Windows".to_string(),
        ))
    }
}

/// Recursive copy tagged with a marker file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyMechanism;

impl LinkMechanism for CopyMechanism {
    fn method(&self) -> LinkMethod {
        LinkMethod::Copy
    }

    fn create(&self, source: &Path, target: &Path) -> Result<()> {
        materialize(target, |staged| {
            fsutil::copy_dir(source, staged)?;
            ManagedMarker {
                source: source.to_path_buf(),
                method: LinkMethod::Copy,
            }
            .write(staged)
        })
    }
}

/// Renders canonical commands into an agent's command format.
#[derive(Debug, Clone, Copy)]
pub struct RenderMechanism {
    /// Format of the rendered files.
    pub format: CommandFormat,
}

impl LinkMechanism for RenderMechanism {
    fn method(&self) -> LinkMethod {
        LinkMethod::Render
    }

    fn create(&self, source: &Path, target: &Path) -> Result<()> {
        materialize(target, |staged| {
            fs::create_dir_all(staged).at(staged)?;
            for path in markdown_files(source)? {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let content = fs::read_to_string(&path).at(&path)?;
                let rendered = match CommandDocument::parse(&content)
                    .and_then(|doc| doc.project(self.format))
                {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        warn!(command = %path.display(), error = %e, "skipping unrenderable command");
                        continue;
                    }
                };
                let out = staged.join(format!("{stem}.{}", self.format.extension()));
                fs::write(&out, rendered).at(&out)?;
            }
            ManagedMarker {
                source: source.to_path_buf(),
                method: LinkMethod::Render,
            }
            .write(staged)
        })
    }
}

/// Mechanisms to try, in order, for a link mode.
#[must_use]
pub fn chain(mode: LinkMode) -> Vec<Box<dyn LinkMechanism>> {
    match mode {
        LinkMode::Symlink => vec![Box::new(SymlinkMechanism)],
        LinkMode::Junction => vec![Box::new(JunctionMechanism)],
        LinkMode::Copy => vec![Box::new(CopyMechanism)],
        LinkMode::Auto => vec![
            Box::new(SymlinkMechanism),
            Box::new(JunctionMechanism),
            Box::new(CopyMechanism),
        ],
    }
}

/// Builds the target in a staging sibling and renames it into place.
fn materialize<F>(target: &Path, build: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let staged = fsutil::staging_path(target, "tmp");
    fsutil::remove_entry(&staged)?;
    if let Err(e) = build(&staged) {
        let _ = fsutil::remove_entry(&staged);
        return Err(e);
    }
    fsutil::replace_with(&staged, target)
}

fn markdown_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .at(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "md")
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        })
        .collect();
    files.sort();
    Ok(files)
}
