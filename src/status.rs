//! Read-only reporting over the registry, the links and the store.

use std::path::PathBuf;

use crate::agent::{self, AgentDefinition};
use crate::error::Result;
use crate::link::{LinkEntry, LinkManager};
use crate::platform::Environment;
use crate::store::{ArtifactCounts, CanonicalStore, MarketplaceRecord};
use crate::types::LinkMode;

/// Whether an agent is present on this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installation {
    Installed,
    NotInstalled,
}

impl Installation {
    #[must_use]
    pub fn is_installed(self) -> bool {
        self == Self::Installed
    }
}

/// Detects whether `agent` is installed.
///
/// CLI agents count as installed when their binary is on the search path or
/// their home directory exists. IDE agents need the home directory.
#[must_use]
pub fn detect(agent: &AgentDefinition, env: &Environment) -> Installation {
    let home_exists = agent.home_dir(env).is_dir();
    let cli_found = agent.cli.is_some_and(|cli| env.find_binary(cli).is_some());
    if home_exists || cli_found {
        Installation::Installed
    } else {
        Installation::NotInstalled
    }
}

/// Every registered agent detected as installed.
#[must_use]
pub fn installed(env: &Environment) -> Vec<&'static AgentDefinition> {
    agent::all()
        .iter()
        .filter(|agent| detect(agent, env).is_installed())
        .collect()
}

/// Detection details for one agent, as shown by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCheck {
    pub agent: &'static AgentDefinition,
    /// Resolved CLI binary, if the agent has one and it was found.
    pub cli_path: Option<PathBuf>,
    pub home_exists: bool,
    pub installation: Installation,
}

/// Installation and link state of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub agent: &'static AgentDefinition,
    pub installation: Installation,
    pub enabled: bool,
    /// Link states, only computed for enabled agents.
    pub links: Vec<LinkEntry>,
}

/// Snapshot of the whole system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub store_root: PathBuf,
    /// `false` until the first `init` or mutation writes `config.json`.
    pub initialized: bool,
    pub sync_mode: LinkMode,
    pub agents: Vec<AgentStatus>,
    /// Enabled identifiers missing from the registry.
    pub unknown_agents: Vec<String>,
    pub counts: ArtifactCounts,
    pub marketplaces: Vec<MarketplaceRecord>,
}

/// Composes registry, link and store information without writing anything.
#[derive(Debug, Clone, Copy)]
pub struct StatusReporter<'a> {
    env: &'a Environment,
    store: &'a CanonicalStore,
}

impl<'a> StatusReporter<'a> {
    #[must_use]
    pub fn new(env: &'a Environment, store: &'a CanonicalStore) -> Self {
        Self { env, store }
    }

    /// Builds the full status report.
    ///
    /// # Errors
    ///
    /// Fails as a whole if the config or the store cannot be read.
    pub fn status(&self) -> Result<StatusReport> {
        let config = self.store.load_config()?;
        let counts = self.store.counts()?;
        let links = LinkManager::new(self.env, self.store).with_mode(config.sync_mode);
        let (_, unknown_agents) = config.resolve_enabled();

        let agents = agent::all()
            .iter()
            .map(|agent| {
                let enabled = config.enabled_agents.contains(agent.id);
                AgentStatus {
                    agent,
                    installation: detect(agent, self.env),
                    enabled,
                    links: if enabled { links.entries(agent) } else { Vec::new() },
                }
            })
            .collect();

        Ok(StatusReport {
            store_root: self.store.root().to_path_buf(),
            initialized: self.store.config_path().is_file(),
            sync_mode: config.sync_mode,
            agents,
            unknown_agents,
            counts,
            marketplaces: config.marketplaces,
        })
    }

    /// Detection details for every registered agent.
    #[must_use]
    pub fn check(&self) -> Vec<AgentCheck> {
        agent::all()
            .iter()
            .map(|agent| AgentCheck {
                agent,
                cli_path: agent.cli.and_then(|cli| self.env.find_binary(cli)),
                home_exists: agent.home_dir(self.env).is_dir(),
                installation: detect(agent, self.env),
            })
            .collect()
    }
}
