//! Command-line interface.
//!
//! Every command returns the text to print and whether it fully succeeded.
//! Batch commands print their per-item table even when some items failed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use agent_plugins::agent::{self, AgentDefinition};
use agent_plugins::extract::ExtractionEngine;
use agent_plugins::link::LinkManager;
use agent_plugins::marketplace::{MarketplaceManager, UpdateOutcome};
use agent_plugins::platform::Environment;
use agent_plugins::status::{self, StatusReporter};
use agent_plugins::store::CanonicalStore;
use agent_plugins::types::{ArtifactKind, LinkMode};
use agent_plugins::update;

mod output;

pub use output::Output;

/// Universal plugin manager for AI coding agents.
#[derive(Debug, Parser)]
#[command(name = "agent-plugins", version)]
#[command(about = "One canonical store of skills, commands, agents and hooks, linked into every agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Canonical store directory (default: $AGENT_PLUGINS_HOME or ~/.agent)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level or filter directive (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the canonical store, choose agents and link them
    Init {
        /// Comma-separated agents to enable (default: installed agents)
        #[arg(long, short)]
        agents: Option<String>,
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Show agents, links, artifact counts and marketplaces
    Status,
    /// Show how each agent was detected
    Check,
    /// Reconcile agent directories with the canonical store
    Sync {
        /// Comma-separated agents (default: enabled agents)
        #[arg(long, short)]
        agents: Option<String>,
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Copy artifacts from tracked marketplaces into the canonical store
    Extract {
        /// Marketplace to extract (default: all)
        name: Option<String>,
        /// Replace artifacts that already exist
        #[arg(long, short)]
        force: bool,
    },
    /// List canonical artifacts and marketplace plugins
    List,
    /// Manage marketplaces
    Marketplace {
        #[command(subcommand)]
        command: MarketplaceCommands,
    },
    /// Add a local skill directory to the canonical store
    AddSkill {
        /// Skill directory or its SKILL.md
        path: PathBuf,
        /// Name in the store (default: directory name)
        #[arg(long)]
        name: Option<String>,
        /// Replace an existing skill with the same name
        #[arg(long, short)]
        force: bool,
    },
    /// Remove a skill from the canonical store
    RemoveSkill {
        name: String,
    },
    /// Enable an agent for sync
    Enable {
        agent: String,
    },
    /// Disable an agent for sync
    Disable {
        agent: String,
    },
    /// Print the version
    Version {
        /// Check crates.io for a newer release
        #[arg(long)]
        check: bool,
    },
    /// Update all marketplaces, then extract from all of them
    Upgrade {
        /// Replace artifacts that already exist
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum MarketplaceCommands {
    /// Clone a marketplace (org/repo, URL or local path) and extract it
    Add {
        source: String,
        /// Replace artifacts that already exist
        #[arg(long, short)]
        force: bool,
        /// Only clone, do not extract
        #[arg(long)]
        no_extract: bool,
    },
    /// Delete a marketplace clone (extracted artifacts are kept)
    Remove {
        name: String,
    },
    /// Fetch the latest commit of one or all marketplaces
    Update {
        name: Option<String>,
    },
    /// List tracked marketplaces
    List,
}

/// Options shared by `init` and `sync`.
#[derive(Debug, Clone, clap::Args)]
pub struct LinkArgs {
    /// Link mechanism (symlink, junction, copy, auto)
    #[arg(long)]
    pub mode: Option<LinkMode>,
    /// Replace existing content at agent paths
    #[arg(long, short)]
    pub force: bool,
    /// With --force, move existing content aside instead of deleting it
    #[arg(long)]
    pub backup: bool,
}

/// Text to print and whether the command fully succeeded.
#[derive(Debug)]
pub struct Execution {
    pub output: String,
    pub success: bool,
}

impl Execution {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

/// Resolved state for one invocation.
pub struct CliContext {
    env: Environment,
    store: CanonicalStore,
    out: Output,
}

impl CliContext {
    pub fn new(home: Option<PathBuf>, out: Output) -> Result<Self> {
        let env = Environment::detect(home.as_deref()).context("cannot resolve the canonical store")?;
        Ok(Self::with_env(env, out))
    }

    /// Context over an explicit environment.
    pub fn with_env(env: Environment, out: Output) -> Self {
        let store = CanonicalStore::from_env(&env);
        Self { env, store, out }
    }

    pub fn execute(&self, command: &Commands) -> Result<Execution> {
        match command {
            Commands::Init { agents, link } => self.init(agents.as_deref(), link),
            Commands::Status => {
                let report = StatusReporter::new(&self.env, &self.store).status()?;
                Ok(Execution::ok(self.out.status(&report)))
            }
            Commands::Check => {
                let checks = StatusReporter::new(&self.env, &self.store).check();
                Ok(Execution::ok(self.out.check(&checks)))
            }
            Commands::Sync { agents, link } => self.sync(agents.as_deref(), link),
            Commands::Extract { name, force } => self.extract(name.as_deref(), *force),
            Commands::List => self.list(),
            Commands::Marketplace { command } => self.marketplace(command),
            Commands::AddSkill { path, name, force } => {
                let dest = self.store.add_skill(path, name.as_deref(), *force)?;
                Ok(Execution::ok(
                    self.out.success(&format!("added skill at {}", dest.display())),
                ))
            }
            Commands::RemoveSkill { name } => {
                self.store.remove_skill(name)?;
                Ok(Execution::ok(self.out.success(&format!("removed skill '{name}'"))))
            }
            Commands::Enable { agent } => self.toggle(agent, true),
            Commands::Disable { agent } => self.toggle(agent, false),
            Commands::Version { check } => self.version(*check),
            Commands::Upgrade { force } => self.upgrade(*force),
        }
    }

    fn init(&self, agents: Option<&str>, link: &LinkArgs) -> Result<Execution> {
        self.store.ensure_layout()?;
        let mut config = self.store.load_config()?;

        let enabled: Vec<&'static AgentDefinition> = match agents {
            Some(list) => agent::parse_list(list)?,
            None => {
                let detected = status::installed(&self.env);
                if detected.is_empty() {
                    agent::DEFAULT_AGENTS
                        .iter()
                        .map(|id| agent::lookup(id))
                        .collect::<std::result::Result<_, _>>()?
                } else {
                    detected
                }
            }
        };

        config.enabled_agents = enabled.iter().map(|a| a.id.to_string()).collect();
        if let Some(mode) = link.mode {
            config.sync_mode = mode;
        }
        self.store.save_config(&config)?;
        info!(agents = ?config.enabled_agents, "initialized canonical store");

        let report = LinkManager::new(&self.env, &self.store)
            .with_mode(config.sync_mode)
            .with_backup(link.backup)
            .sync(&enabled, link.force);

        let mut output = self
            .out
            .success(&format!("canonical store at {}", self.store.root().display()));
        output.push_str("\n\n");
        output.push_str(&self.out.sync_report(&report));
        Ok(Execution {
            output,
            success: !report.has_failures(),
        })
    }

    fn sync(&self, agents: Option<&str>, link: &LinkArgs) -> Result<Execution> {
        let config = self.store.load_config()?;
        let (targets, unknown) = match agents {
            Some(list) => (agent::parse_list(list)?, Vec::new()),
            None => config.resolve_enabled(),
        };
        self.store.ensure_layout()?;

        let mut report = LinkManager::new(&self.env, &self.store)
            .with_mode(link.mode.unwrap_or(config.sync_mode))
            .with_backup(link.backup)
            .sync(&targets, link.force);
        report.unknown_agents = unknown;

        Ok(Execution {
            output: self.out.sync_report(&report),
            success: !report.has_failures(),
        })
    }

    fn extract(&self, name: Option<&str>, force: bool) -> Result<Execution> {
        let config = self.store.load_config()?;
        let records: Vec<_> = match name {
            Some(name) => vec![
                config
                    .marketplace(name)
                    .cloned()
                    .with_context(|| format!("marketplace '{name}' is not tracked"))?,
            ],
            None => config.marketplaces.clone(),
        };
        if records.is_empty() {
            return Ok(Execution::ok(
                "No marketplaces tracked. Add one with 'agent-plugins marketplace add <org/repo>'.\n"
                    .to_string(),
            ));
        }

        let engine = ExtractionEngine::new(&self.store);
        let mut output = String::new();
        let mut success = true;
        for record in &records {
            match engine.extract(record, force) {
                Ok(report) => {
                    success &= !report.has_failures();
                    output.push_str(&self.out.extraction(&report));
                }
                Err(e) => {
                    success = false;
                    output.push_str(&self.out.warning(&format!("{}: {e}", record.name)));
                    output.push('\n');
                }
            }
            output.push('\n');
        }
        Ok(Execution { output, success })
    }

    fn list(&self) -> Result<Execution> {
        let artifacts = ArtifactKind::ALL
            .iter()
            .map(|&kind| Ok((kind, self.store.list_artifacts(kind)?)))
            .collect::<agent_plugins::Result<Vec<_>>>()?;
        let infos = MarketplaceManager::new(&self.store).list()?;
        Ok(Execution::ok(self.out.listing(&artifacts, &infos)))
    }

    fn marketplace(&self, command: &MarketplaceCommands) -> Result<Execution> {
        let manager = MarketplaceManager::new(&self.store);
        match command {
            MarketplaceCommands::Add {
                source,
                force,
                no_extract,
            } => {
                let record = manager.add(source)?;
                let mut output = self.out.success(&format!(
                    "added marketplace '{}' from {}",
                    record.name, record.url
                ));
                output.push_str("\n\n");
                if *no_extract {
                    return Ok(Execution::ok(output));
                }
                let report = ExtractionEngine::new(&self.store).extract(&record, *force)?;
                output.push_str(&self.out.extraction(&report));
                Ok(Execution {
                    output,
                    success: !report.has_failures(),
                })
            }
            MarketplaceCommands::Remove { name } => {
                let record = manager.remove(name)?;
                Ok(Execution::ok(self.out.success(&format!(
                    "removed marketplace '{}' (extracted artifacts kept)",
                    record.name
                ))))
            }
            MarketplaceCommands::Update { name } => {
                let results = manager.update(name.as_deref())?;
                Ok(Execution {
                    success: !results
                        .iter()
                        .any(|r| matches!(r.outcome, UpdateOutcome::Failed(_))),
                    output: self.out.updates(&results),
                })
            }
            MarketplaceCommands::List => Ok(Execution::ok(self.out.marketplaces(&manager.list()?))),
        }
    }

    fn toggle(&self, id: &str, enable: bool) -> Result<Execution> {
        let mut config = self.store.load_config()?;
        let changed = if enable {
            config.enable(id)?
        } else {
            config.disable(id)?
        };
        if changed {
            self.store.save_config(&config)?;
        }
        let verb = if enable { "enabled" } else { "disabled" };
        let message = if changed {
            format!("{verb} {id}; run 'agent-plugins sync' to apply")
        } else {
            format!("{id} was already {verb}")
        };
        Ok(Execution::ok(self.out.success(&message)))
    }

    fn version(&self, check: bool) -> Result<Execution> {
        let mut output = format!("agent-plugins {}\n", update::CURRENT_VERSION);
        if !check {
            return Ok(Execution::ok(output));
        }
        match update::check_latest() {
            Ok(result) if result.update_available() => {
                output.push_str(&self.out.warning(&format!(
                    "version {} is available (cargo install agent-plugins)",
                    result.latest
                )));
            }
            Ok(_) => output.push_str(&self.out.success("up to date")),
            Err(e) => {
                output.push_str(&self.out.warning(&format!("update check failed: {e}")));
                output.push('\n');
                return Ok(Execution {
                    output,
                    success: false,
                });
            }
        }
        output.push('\n');
        Ok(Execution::ok(output))
    }

    fn upgrade(&self, force: bool) -> Result<Execution> {
        let results = MarketplaceManager::new(&self.store).update(None)?;
        let mut output = self.out.updates(&results);
        output.push('\n');
        let mut success = !results
            .iter()
            .any(|r| matches!(r.outcome, UpdateOutcome::Failed(_)));

        let extraction = self.extract(None, force)?;
        output.push_str(&extraction.output);
        success &= extraction.success;
        Ok(Execution { output, success })
    }
}
