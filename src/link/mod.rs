//! Link reconciliation between agent paths and the canonical store.
//!
//! For every enabled agent and every component it supports, the agent's
//! expected path should resolve to the matching canonical directory. The
//! manager inspects each target, leaves healthy links alone, refreshes
//! copies, and refuses to touch anything it did not create unless forced.
//! A failure on one pair never stops the others.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agent::AgentDefinition;
use crate::error::{IoResultExt, Result};
use crate::fsutil;
use crate::platform::Environment;
use crate::store::CanonicalStore;
use crate::types::{CommandFormat, Component, LinkMode};

pub mod mechanism;
pub mod state;

pub use mechanism::{LinkMechanism, LinkMethod};
pub use state::{LinkState, inspect};

/// Binding between one canonical directory and one agent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Agent identifier.
    pub agent: &'static str,
    /// Component being linked.
    pub component: Component,
    /// Canonical directory.
    pub source: PathBuf,
    /// Path the agent reads.
    pub target: PathBuf,
    /// State observed before any change.
    pub state: LinkState,
}

/// Result of reconciling one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Nothing was there; a link was created.
    Created(LinkMethod),
    /// The correct link already existed. Nothing was touched.
    AlreadyLinked,
    /// A managed copy was materialized again.
    Refreshed(LinkMethod),
    /// Existing content was removed (force) and a link created.
    Replaced(LinkMethod),
    /// Existing content blocks the link and force was not requested.
    Conflict(LinkState),
    /// Every mechanism failed, or the existing entry could not be removed.
    Failed(String),
}

impl LinkOutcome {
    /// Returns `true` if the target does not serve canonical content afterwards.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Failed(_))
    }

    /// Short label for tables.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Created(method) => format!("created ({method})"),
            Self::AlreadyLinked => "already-linked".to_string(),
            Self::Refreshed(method) => format!("refreshed ({method})"),
            Self::Replaced(method) => format!("replaced ({method})"),
            Self::Conflict(state) => format!("conflict ({})", state.label()),
            Self::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

/// Outcome of reconciling one pair, with the state it started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    /// The pair and its state before reconciliation.
    pub entry: LinkEntry,
    /// What happened.
    pub outcome: LinkOutcome,
    /// Where pre-existing content was moved, if backed up.
    pub backup: Option<PathBuf>,
}

/// Aggregate result of a sync over many agents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// One result per agent × component pair.
    pub results: Vec<LinkResult>,
    /// Enabled identifiers that are not in the registry.
    pub unknown_agents: Vec<String>,
}

impl SyncReport {
    /// Returns `true` if any pair failed or conflicted, or an agent was unknown.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.unknown_agents.is_empty() || self.results.iter().any(|r| r.outcome.is_failure())
    }
}

/// Reconciles agent paths against the canonical store.
#[derive(Debug, Clone)]
pub struct LinkManager<'a> {
    env: &'a Environment,
    store: &'a CanonicalStore,
    mode: LinkMode,
    backup: bool,
}

impl<'a> LinkManager<'a> {
    /// Creates a manager using [`LinkMode::Auto`] and no backups.
    #[must_use]
    pub fn new(env: &'a Environment, store: &'a CanonicalStore) -> Self {
        Self {
            env,
            store,
            mode: LinkMode::Auto,
            backup: false,
        }
    }

    /// Sets the preferred link mode.
    #[must_use]
    pub fn with_mode(mut self, mode: LinkMode) -> Self {
        self.mode = mode;
        self
    }

    /// Back up occupied targets instead of deleting them on force.
    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Computes the current state of every pair for an agent without
    /// changing anything.
    #[must_use]
    pub fn entries(&self, agent: &'static AgentDefinition) -> Vec<LinkEntry> {
        agent
            .components()
            .filter_map(|component| self.entry(agent, component))
            .collect()
    }

    fn entry(&self, agent: &'static AgentDefinition, component: Component) -> Option<LinkEntry> {
        let target = agent.target_path(component, self.env)?;
        let source = self.store.component_dir(component);
        let state = inspect(&target, &source);
        Some(LinkEntry {
            agent: agent.id,
            component,
            source,
            target,
            state,
        })
    }

    /// Reconciles every supported component of every given agent.
    pub fn sync(&self, agents: &[&'static AgentDefinition], force: bool) -> SyncReport {
        let mut report = SyncReport::default();
        for &agent in agents {
            for component in agent.components() {
                if let Some(result) = self.reconcile(agent, component, force) {
                    report.results.push(result);
                }
            }
        }
        report
    }

    /// Reconciles one agent × component pair.
    ///
    /// Returns `None` if the agent does not support the component.
    pub fn reconcile(
        &self,
        agent: &'static AgentDefinition,
        component: Component,
        force: bool,
    ) -> Option<LinkResult> {
        let entry = self.entry(agent, component)?;
        let mechanisms = self.mechanisms_for(agent, component);
        let mut backup = None;

        let outcome = match self.apply(&entry, &mechanisms, force, &mut backup) {
            Ok(outcome) => outcome,
            Err(e) => LinkOutcome::Failed(e.to_string()),
        };

        match &outcome {
            LinkOutcome::AlreadyLinked => {
                debug!(agent = agent.id, %component, "already linked");
            }
            LinkOutcome::Conflict(state) => {
                warn!(
                    agent = agent.id,
                    %component,
                    target = %entry.target.display(),
                    state = state.label(),
                    "target exists, not replacing without force"
                );
            }
            LinkOutcome::Failed(reason) => {
                warn!(agent = agent.id, %component, %reason, "link failed");
            }
            other => {
                info!(
                    agent = agent.id,
                    %component,
                    target = %entry.target.display(),
                    outcome = %other.label(),
                    "linked"
                );
            }
        }

        Some(LinkResult {
            entry,
            outcome,
            backup,
        })
    }

    /// Mechanisms for a pair. TOML agents always get rendered commands.
    fn mechanisms_for(
        &self,
        agent: &AgentDefinition,
        component: Component,
    ) -> Vec<Box<dyn LinkMechanism>> {
        if component == Component::Commands && agent.command_format == CommandFormat::Toml {
            return vec![Box::new(mechanism::RenderMechanism {
                format: agent.command_format,
            })];
        }
        mechanism::chain(self.mode)
    }

    fn apply(
        &self,
        entry: &LinkEntry,
        mechanisms: &[Box<dyn LinkMechanism>],
        force: bool,
        backup: &mut Option<PathBuf>,
    ) -> Result<LinkOutcome> {
        fs::create_dir_all(&entry.source).at(&entry.source)?;
        let wants_link = mechanisms.iter().any(|m| m.method().is_link());

        match &entry.state {
            LinkState::Linked if wants_link => Ok(LinkOutcome::AlreadyLinked),
            LinkState::Absent => Ok(match materialize(mechanisms, &entry.source, &entry.target) {
                Ok(method) => LinkOutcome::Created(method),
                Err(reason) => LinkOutcome::Failed(reason),
            }),
            LinkState::Linked | LinkState::ManagedCopy { .. } => {
                let result = if wants_link {
                    rematerialize(mechanisms, &entry.source, &entry.target)?
                } else {
                    // Copy and render stage their output and swap it in.
                    materialize(mechanisms, &entry.source, &entry.target)
                };
                Ok(match result {
                    Ok(method) => LinkOutcome::Refreshed(method),
                    Err(reason) => LinkOutcome::Failed(reason),
                })
            }
            state if !force => Ok(LinkOutcome::Conflict(state.clone())),
            state => {
                if self.backup && *state == LinkState::Occupied {
                    *backup = Some(back_up(&entry.target)?);
                } else {
                    fsutil::remove_entry(&entry.target)?;
                }
                Ok(match materialize(mechanisms, &entry.source, &entry.target) {
                    Ok(method) => LinkOutcome::Replaced(method),
                    Err(reason) => LinkOutcome::Failed(reason),
                })
            }
        }
    }
}

/// Tries each mechanism in order; returns the first that succeeds.
fn materialize(
    mechanisms: &[Box<dyn LinkMechanism>],
    source: &Path,
    target: &Path,
) -> std::result::Result<LinkMethod, String> {
    if let Some(parent) = target.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return Err(format!("cannot create {}: {e}", parent.display()));
    }

    let mut errors = Vec::new();
    for mechanism in mechanisms {
        match mechanism.create(source, target) {
            Ok(()) => return Ok(mechanism.method()),
            Err(e) => {
                debug!(method = %mechanism.method(), error = %e, "link mechanism failed");
                errors.push(format!("{}: {e}", mechanism.method()));
            }
        }
    }
    Err(errors.join("; "))
}

/// Re-runs a chain that starts with a link over an existing target.
///
/// Links need an empty target, so the current entry is moved to a staging
/// sibling first and restored if every mechanism fails.
fn rematerialize(
    mechanisms: &[Box<dyn LinkMechanism>],
    source: &Path,
    target: &Path,
) -> Result<std::result::Result<LinkMethod, String>> {
    let previous = fsutil::staging_path(target, "prev");
    fsutil::remove_entry(&previous)?;
    fs::rename(target, &previous).at(target)?;

    let result = materialize(mechanisms, source, target);
    match &result {
        Ok(_) => {
            if let Err(e) = fsutil::remove_entry(&previous) {
                warn!(path = %previous.display(), error = %e, "cannot remove previous target");
            }
        }
        Err(_) => {
            let _ = fsutil::remove_entry(target);
            fs::rename(&previous, target).at(target)?;
        }
    }
    Ok(result)
}

/// Moves `target` aside to `<target>.backup-<timestamp>`.
fn back_up(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let backup = target.with_file_name(format!("{name}.backup-{stamp}"));
    fs::rename(target, &backup).at(target)?;
    info!(from = %target.display(), to = %backup.display(), "backed up existing content");
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent;

    struct Fixture {
        _dir: tempfile::TempDir,
        env: Environment,
        store: CanonicalStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new(dir.path().join("home"), dir.path().join("home/.agent"));
        let store = CanonicalStore::from_env(&env);
        store.ensure_layout().unwrap();
        Fixture {
            _dir: dir,
            env,
            store,
        }
    }

    fn outcome_for(report: &SyncReport, agent: &str, component: Component) -> LinkOutcome {
        report
            .results
            .iter()
            .find(|r| r.entry.agent == agent && r.entry.component == component)
            .map(|r| r.outcome.clone())
            .unwrap()
    }

    #[test]
    fn copy_mode_materializes_every_supported_component() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Copy);

        let report = manager.sync(&[codex], false);

        assert_eq!(report.results.len(), codex.components().count());
        assert!(!report.has_failures());
        for result in &report.results {
            assert_eq!(result.outcome, LinkOutcome::Created(LinkMethod::Copy));
            assert!(result.entry.target.is_dir());
        }
    }

    #[test]
    fn copy_mode_refreshes_on_every_sync() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Copy);
        manager.sync(&[codex], false);

        let skill = f.store.kind_dir(crate::types::ArtifactKind::Skill).join("new");
        fs::create_dir_all(&skill).unwrap();
        fs::write(skill.join("SKILL.md"), "new").unwrap();

        let report = manager.sync(&[codex], false);
        assert_eq!(
            outcome_for(&report, "codex", Component::Skills),
            LinkOutcome::Refreshed(LinkMethod::Copy)
        );
        let target = codex.target_path(Component::Skills, &f.env).unwrap();
        assert!(target.join("new/SKILL.md").is_file());
    }

    #[test]
    fn one_failed_pair_does_not_stop_the_others() {
        let f = fixture();
        let claude = agent::lookup("claude").unwrap();
        let home = claude.home_dir(&f.env);
        fs::create_dir_all(&home).unwrap();
        fs::write(home.join("plugins"), "a file where a directory is expected").unwrap();

        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Copy);
        let report = manager.sync(&[claude], false);

        assert!(report.has_failures());
        assert!(matches!(
            outcome_for(&report, "claude", Component::Marketplaces),
            LinkOutcome::Failed(_)
        ));
        for component in [
            Component::Skills,
            Component::Commands,
            Component::Agents,
            Component::Hooks,
        ] {
            assert_eq!(
                outcome_for(&report, "claude", component),
                LinkOutcome::Created(LinkMethod::Copy),
                "{component}"
            );
        }
    }

    struct Refusing(LinkMethod);

    impl LinkMechanism for Refusing {
        fn method(&self) -> LinkMethod {
            self.0
        }

        fn create(&self, _source: &Path, _target: &Path) -> Result<()> {
            Err(crate::Error::Unsupported("refused".to_string()))
        }
    }

    fn copied_skills(f: &Fixture) -> (LinkManager<'_>, LinkEntry) {
        let skill = f.store.kind_dir(crate::types::ArtifactKind::Skill).join("kept");
        fs::create_dir_all(&skill).unwrap();
        fs::write(skill.join("SKILL.md"), "kept").unwrap();
        let codex = agent::lookup("codex").unwrap();
        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Copy);
        manager.reconcile(codex, Component::Skills, false).unwrap();
        let entry = manager.entry(codex, Component::Skills).unwrap();
        assert!(matches!(entry.state, LinkState::ManagedCopy { .. }));
        (manager, entry)
    }

    #[test]
    fn failed_copy_refresh_keeps_the_previous_copy() {
        let f = fixture();
        let (manager, entry) = copied_skills(&f);

        let chain: Vec<Box<dyn LinkMechanism>> = vec![Box::new(Refusing(LinkMethod::Copy))];
        let outcome = manager.apply(&entry, &chain, false, &mut None).unwrap();

        assert!(matches!(outcome, LinkOutcome::Failed(_)));
        assert_eq!(
            fs::read_to_string(entry.target.join("kept/SKILL.md")).unwrap(),
            "kept"
        );
        assert_eq!(inspect(&entry.target, &entry.source), entry.state);
    }

    #[test]
    fn failed_link_upgrade_restores_the_previous_copy() {
        let f = fixture();
        let (manager, entry) = copied_skills(&f);

        let chain: Vec<Box<dyn LinkMechanism>> = vec![
            Box::new(Refusing(LinkMethod::Symlink)),
            Box::new(Refusing(LinkMethod::Copy)),
        ];
        let outcome = manager.apply(&entry, &chain, false, &mut None).unwrap();

        assert!(matches!(outcome, LinkOutcome::Failed(_)));
        assert!(entry.target.join("kept/SKILL.md").is_file());
        assert_eq!(inspect(&entry.target, &entry.source), entry.state);
        assert!(!fsutil::entry_exists(&fsutil::staging_path(
            &entry.target,
            "prev"
        )));
    }

    #[test]
    fn occupied_target_is_a_conflict_without_force() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let target = codex.target_path(Component::Skills, &f.env).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("mine.md"), "user content").unwrap();

        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Copy);
        let report = manager.sync(&[codex], false);

        assert_eq!(
            outcome_for(&report, "codex", Component::Skills),
            LinkOutcome::Conflict(LinkState::Occupied)
        );
        assert!(report.has_failures());
        assert_eq!(
            fs::read_to_string(target.join("mine.md")).unwrap(),
            "user content"
        );
    }

    #[test]
    fn force_with_backup_preserves_old_content() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let target = codex.target_path(Component::Skills, &f.env).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("mine.md"), "user content").unwrap();

        let manager = LinkManager::new(&f.env, &f.store)
            .with_mode(LinkMode::Copy)
            .with_backup(true);
        let result = manager.reconcile(codex, Component::Skills, true).unwrap();

        assert_eq!(result.outcome, LinkOutcome::Replaced(LinkMethod::Copy));
        let backup = result.backup.unwrap();
        assert_eq!(
            fs::read_to_string(backup.join("mine.md")).unwrap(),
            "user content"
        );
        assert!(!target.join("mine.md").exists());
    }

    #[test]
    fn toml_agents_get_rendered_commands() {
        let f = fixture();
        fs::write(
            f.store.kind_dir(crate::types::ArtifactKind::Command).join("bar.md"),
            "---\ndescription: Bar\n---\nDo $ARGUMENTS\n",
        )
        .unwrap();
        let gemini = agent::lookup("gemini").unwrap();
        let manager = LinkManager::new(&f.env, &f.store);

        let result = manager.reconcile(gemini, Component::Commands, false).unwrap();

        assert_eq!(result.outcome, LinkOutcome::Created(LinkMethod::Render));
        let rendered = fs::read_to_string(result.entry.target.join("bar.toml")).unwrap();
        assert!(rendered.contains("{{args}}"));
    }

    #[test]
    fn unsupported_component_is_skipped() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let manager = LinkManager::new(&f.env, &f.store);
        assert!(manager.reconcile(codex, Component::Hooks, false).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn second_symlink_sync_is_a_no_op() {
        let f = fixture();
        let claude = agent::lookup("claude").unwrap();
        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Symlink);

        let first = manager.sync(&[claude], false);
        assert!(!first.has_failures());
        assert!(first
            .results
            .iter()
            .all(|r| r.outcome == LinkOutcome::Created(LinkMethod::Symlink)));

        let second = manager.sync(&[claude], false);
        assert!(second
            .results
            .iter()
            .all(|r| r.outcome == LinkOutcome::AlreadyLinked));
    }

    #[cfg(unix)]
    #[test]
    fn stale_link_needs_force() {
        let f = fixture();
        let codex = agent::lookup("codex").unwrap();
        let target = codex.target_path(Component::Skills, &f.env).unwrap();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(f.env.home().join("nowhere"), &target).unwrap();

        let manager = LinkManager::new(&f.env, &f.store).with_mode(LinkMode::Symlink);
        let result = manager.reconcile(codex, Component::Skills, false).unwrap();
        assert!(matches!(
            result.outcome,
            LinkOutcome::Conflict(LinkState::StaleLink { .. })
        ));

        let result = manager.reconcile(codex, Component::Skills, true).unwrap();
        assert_eq!(result.outcome, LinkOutcome::Replaced(LinkMethod::Symlink));
        assert_eq!(
            inspect(&target, &f.store.component_dir(Component::Skills)),
            LinkState::Linked
        );
    }

    #[cfg(unix)]
    #[test]
    fn entries_do_not_modify_anything() {
        let f = fixture();
        let claude = agent::lookup("claude").unwrap();
        let manager = LinkManager::new(&f.env, &f.store);

        let entries = manager.entries(claude);

        assert_eq!(entries.len(), claude.components().count());
        assert!(entries.iter().all(|e| e.state == LinkState::Absent));
        assert!(!claude.home_dir(&f.env).exists());
    }
}
