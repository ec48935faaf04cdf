//! Artifact discovery inside a marketplace checkout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};
use crate::types::ArtifactKind;

/// Directory holding per-plugin trees inside a marketplace.
const PLUGINS_DIR: &str = "plugins";

/// Shape of a discovered artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactLayout {
    /// A directory copied as a whole.
    Directory,
    /// A single file, stored under its own file name.
    File,
}

/// An artifact found in a marketplace, not yet ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArtifact {
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Name in the canonical store (directory name or file stem).
    pub name: String,
    /// Location inside the marketplace.
    pub path: PathBuf,
    /// Directory or single file.
    pub layout: ArtifactLayout,
    /// Plugin that provided it, `None` for top-level artifacts.
    pub plugin: Option<String>,
}

/// Lists every artifact under `root`.
///
/// Top-level kind directories come first, then each `plugins/<p>/` in
/// lexical order. Entries inside each directory are sorted, so the result
/// does not depend on directory listing order.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredArtifact>> {
    let mut found = Vec::new();
    scan_tree(root, None, &mut found)?;

    for plugin in sorted_entries(&root.join(PLUGINS_DIR))? {
        if !plugin.is_dir() {
            continue;
        }
        let name = file_name(&plugin);
        scan_tree(&plugin, Some(name), &mut found)?;
    }
    Ok(found)
}

fn scan_tree(base: &Path, plugin: Option<String>, found: &mut Vec<DiscoveredArtifact>) -> Result<()> {
    for &kind in ArtifactKind::ALL {
        for path in sorted_entries(&base.join(kind.dir_name()))? {
            let Some((name, layout)) = classify(kind, &path) else {
                continue;
            };
            found.push(DiscoveredArtifact {
                kind,
                name,
                path,
                layout,
                plugin: plugin.clone(),
            });
        }
    }
    Ok(())
}

/// Decides whether an entry is an artifact of `kind`, and under which name.
fn classify(kind: ArtifactKind, path: &Path) -> Option<(String, ArtifactLayout)> {
    let is_markdown = path.extension().is_some_and(|ext| ext == "md");
    let stem = || {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
    };

    if path.is_dir() {
        return match kind {
            ArtifactKind::Command => None,
            _ => Some((file_name(path), ArtifactLayout::Directory)),
        };
    }
    if !path.is_file() {
        return None;
    }
    match kind {
        ArtifactKind::Skill => None,
        ArtifactKind::Command | ArtifactKind::Agent if is_markdown => {
            stem().map(|s| (s, ArtifactLayout::File))
        }
        ArtifactKind::Command | ArtifactKind::Agent => None,
        ArtifactKind::Hook => stem().map(|s| (s, ArtifactLayout::File)),
    }
}

/// Non-hidden entries of `dir`, sorted. A missing directory has none.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => return Ok(Vec::new()),
        Err(e) => return Err(crate::Error::io(dir, e)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.at(dir)?.path();
        if !file_name(&path).starts_with('.') {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(found: &[DiscoveredArtifact]) -> Vec<String> {
        found
            .iter()
            .map(|a| match &a.plugin {
                Some(p) => format!("{}:{}/{}", a.kind, p, a.name),
                None => format!("{}:{}", a.kind, a.name),
            })
            .collect()
    }

    #[test]
    fn discovers_top_level_then_plugins_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("skills/foo/SKILL.md"), "foo");
        touch(&root.join("commands/bar.md"), "bar");
        touch(&root.join("plugins/zeta/skills/z/SKILL.md"), "z");
        touch(&root.join("plugins/alpha/commands/a.md"), "a");
        touch(&root.join("plugins/alpha/agents/reviewer.md"), "r");

        let found = discover(root).unwrap();

        assert_eq!(
            names(&found),
            vec![
                "skill:foo",
                "command:bar",
                "command:alpha/a",
                "agent:alpha/reviewer",
                "skill:zeta/z",
            ]
        );
    }

    #[test]
    fn skips_hidden_entries_and_wrong_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("skills/.cache/SKILL.md"), "x");
        touch(&root.join("skills/README.md"), "not a skill");
        touch(&root.join("commands/notes.txt"), "not a command");
        touch(&root.join("commands/nested/x.md"), "dirs are not commands");
        touch(&root.join("commands/ok.md"), "ok");

        let found = discover(root).unwrap();
        assert_eq!(names(&found), vec!["command:ok"]);
    }

    #[test]
    fn hooks_may_be_files_or_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("hooks/format.json"), "{}");
        touch(&root.join("hooks/guard/hook.sh"), "#!/bin/sh");

        let found = discover(root).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "format");
        assert_eq!(found[0].layout, ArtifactLayout::File);
        assert_eq!(found[1].name, "guard");
        assert_eq!(found[1].layout, ArtifactLayout::Directory);
    }

    #[test]
    fn empty_repository_has_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }
}
