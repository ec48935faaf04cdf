//! Agent registry: where each supported agent expects its artifacts.
//!
//! The table is read-only at run time. Use [`lookup`] to resolve the token a
//! user typed, or [`all`] to iterate every known agent.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::platform::Environment;
use crate::types::{CommandFormat, Component};

mod registry;

/// Agents enabled by `init` when none are detected on the system.
pub const DEFAULT_AGENTS: &[&str] = &["claude", "opencode", "codex", "gemini"];

/// Sub-directory names, relative to an agent's home, per component.
///
/// `None` means the agent has no place for that component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDirs {
    /// Skills directory.
    pub skills: Option<&'static str>,
    /// Commands directory.
    pub commands: Option<&'static str>,
    /// Agent definitions directory.
    pub agents: Option<&'static str>,
    /// Hooks directory.
    pub hooks: Option<&'static str>,
    /// Plugin marketplaces directory.
    pub marketplaces: Option<&'static str>,
}

/// Immutable description of one supported agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    /// The literal token a user types to reference the agent.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Home directory, relative to the user's home.
    pub home: &'static str,
    /// CLI binary used for installation detection. `None` for IDE-integrated agents.
    pub cli: Option<&'static str>,
    /// Per-component sub-directories.
    pub dirs: ComponentDirs,
    /// Format of command files the agent reads.
    pub command_format: CommandFormat,
}

impl AgentDefinition {
    /// Returns `true` if a CLI binary participates in installation detection.
    #[must_use]
    pub fn requires_cli(&self) -> bool {
        self.cli.is_some()
    }

    /// Sub-directory for a component, if the agent supports it.
    #[must_use]
    pub fn subdir(&self, component: Component) -> Option<&'static str> {
        match component {
            Component::Skills => self.dirs.skills,
            Component::Commands => self.dirs.commands,
            Component::Agents => self.dirs.agents,
            Component::Hooks => self.dirs.hooks,
            Component::Marketplaces => self.dirs.marketplaces,
        }
    }

    /// Returns `true` if the agent has a location for the component.
    #[must_use]
    pub fn supports(&self, component: Component) -> bool {
        self.subdir(component).is_some()
    }

    #[must_use]
    pub fn supports_skills(&self) -> bool {
        self.supports(Component::Skills)
    }

    #[must_use]
    pub fn supports_commands(&self) -> bool {
        self.supports(Component::Commands)
    }

    #[must_use]
    pub fn supports_agents(&self) -> bool {
        self.supports(Component::Agents)
    }

    #[must_use]
    pub fn supports_hooks(&self) -> bool {
        self.supports(Component::Hooks)
    }

    #[must_use]
    pub fn supports_plugins(&self) -> bool {
        self.supports(Component::Marketplaces)
    }

    /// Components this agent supports, in reconciliation order.
    pub fn components(&self) -> impl Iterator<Item = Component> + '_ {
        Component::ALL
            .iter()
            .copied()
            .filter(|&component| self.supports(component))
    }

    /// Absolute home directory of the agent.
    #[must_use]
    pub fn home_dir(&self, env: &Environment) -> PathBuf {
        env.home().join(self.home)
    }

    /// Path where the agent expects the given component.
    #[must_use]
    pub fn target_path(&self, component: Component, env: &Environment) -> Option<PathBuf> {
        self.subdir(component)
            .map(|subdir| self.home_dir(env).join(subdir))
    }
}

/// Returns every known agent.
#[must_use]
pub fn all() -> &'static [AgentDefinition] {
    registry::AGENTS
}

/// Resolves an agent by identifier.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if no agent has this identifier.
pub fn lookup(id: &str) -> Result<&'static AgentDefinition> {
    let id = id.trim();
    registry::AGENTS
        .iter()
        .find(|agent| agent.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| Error::NotFound(format!("agent '{id}'")))
}

/// Parses a comma-separated list of agent identifiers.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] naming the first unknown identifier.
pub fn parse_list(list: &str) -> Result<Vec<&'static AgentDefinition>> {
    let mut agents: Vec<&'static AgentDefinition> = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let agent = lookup(token).map_err(|_| {
            Error::InvalidArgument(format!(
                "unknown agent '{token}' (known: {})",
                all().iter().map(|a| a.id).collect::<Vec<_>>().join(", ")
            ))
        })?;
        if !agents.iter().any(|a| a.id == agent.id) {
            agents.push(agent);
        }
    }
    Ok(agents)
}
