//! Core type definitions shared across components.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of an ingestible artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A skill directory containing `SKILL.md` and assets.
    Skill,
    /// An agent definition.
    Agent,
    /// A slash command.
    Command,
    /// A hook definition.
    Hook,
}

impl ArtifactKind {
    /// All artifact kinds, in discovery order.
    pub const ALL: &'static [ArtifactKind] = &[
        ArtifactKind::Skill,
        ArtifactKind::Command,
        ArtifactKind::Agent,
        ArtifactKind::Hook,
    ];

    /// Directory name used both in the canonical store and in marketplaces.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Agent => "agents",
            Self::Command => "commands",
            Self::Hook => "hooks",
        }
    }

    /// The link component that exposes this kind to agents.
    #[must_use]
    pub fn component(self) -> Component {
        match self {
            Self::Skill => Component::Skills,
            Self::Agent => Component::Agents,
            Self::Command => Component::Commands,
            Self::Hook => Component::Hooks,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skill => write!(f, "skill"),
            Self::Agent => write!(f, "agent"),
            Self::Command => write!(f, "command"),
            Self::Hook => write!(f, "hook"),
        }
    }
}

/// A canonical directory that can be linked into an agent's home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// `skills/`
    Skills,
    /// `commands/`
    Commands,
    /// `agents/`
    Agents,
    /// `hooks/`
    Hooks,
    /// `plugins/marketplaces/`
    Marketplaces,
}

impl Component {
    /// All components, in reconciliation order.
    pub const ALL: &'static [Component] = &[
        Component::Skills,
        Component::Commands,
        Component::Agents,
        Component::Hooks,
        Component::Marketplaces,
    ];

    /// The artifact kind stored in this component, if any.
    #[must_use]
    pub fn artifact_kind(self) -> Option<ArtifactKind> {
        match self {
            Self::Skills => Some(ArtifactKind::Skill),
            Self::Commands => Some(ArtifactKind::Command),
            Self::Agents => Some(ArtifactKind::Agent),
            Self::Hooks => Some(ArtifactKind::Hook),
            Self::Marketplaces => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skills => write!(f, "skills"),
            Self::Commands => write!(f, "commands"),
            Self::Agents => write!(f, "agents"),
            Self::Hooks => write!(f, "hooks"),
            Self::Marketplaces => write!(f, "marketplaces"),
        }
    }
}

/// File format an agent expects for command files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFormat {
    /// Markdown with YAML front-matter and a `$ARGUMENTS` placeholder.
    Markdown,
    /// TOML with `description` and `prompt` keys and a `{{args}}` placeholder.
    Toml,
}

impl CommandFormat {
    /// File extension for command files in this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Toml => "toml",
        }
    }
}

impl fmt::Display for CommandFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

/// Preferred way of materializing links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Symbolic links only.
    Symlink,
    /// Directory junctions only (Windows).
    Junction,
    /// Physical copies only.
    Copy,
    /// Try symlink, then junction, then copy.
    #[default]
    Auto,
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symlink => write!(f, "symlink"),
            Self::Junction => write!(f, "junction"),
            Self::Copy => write!(f, "copy"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for LinkMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symlink" => Ok(Self::Symlink),
            "junction" => Ok(Self::Junction),
            "copy" => Ok(Self::Copy),
            "auto" => Ok(Self::Auto),
            other => Err(Error::InvalidArgument(format!(
                "unknown link mode '{other}' (expected symlink, junction, copy or auto)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_kind_dir_names() {
        assert_eq!(ArtifactKind::Skill.dir_name(), "skills");
        assert_eq!(ArtifactKind::Agent.dir_name(), "agents");
        assert_eq!(ArtifactKind::Command.dir_name(), "commands");
        assert_eq!(ArtifactKind::Hook.dir_name(), "hooks");
    }

    #[test]
    fn every_kind_maps_back_from_its_component() {
        for &kind in ArtifactKind::ALL {
            assert_eq!(kind.component().artifact_kind(), Some(kind));
        }
        assert_eq!(Component::Marketplaces.artifact_kind(), None);
    }

    #[test]
    fn link_mode_parses_case_insensitively() {
        assert_eq!("Symlink".parse::<LinkMode>().unwrap(), LinkMode::Symlink);
        assert_eq!("copy".parse::<LinkMode>().unwrap(), LinkMode::Copy);
        assert_eq!(" auto ".parse::<LinkMode>().unwrap(), LinkMode::Auto);
        assert!("hardlink".parse::<LinkMode>().is_err());
    }

    #[test]
    fn link_mode_serializes_lowercase() {
        let json = serde_json::to_string(&LinkMode::Junction).unwrap();
        assert_eq!(json, r#""junction""#);
        let parsed: LinkMode = serde_json::from_str(r#""auto""#).unwrap();
        assert_eq!(parsed, LinkMode::Auto);
    }
}
