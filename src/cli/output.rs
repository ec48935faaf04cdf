//! Human-readable rendering of command results.

use std::fmt::Write as _;

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, Color, Table};
use owo_colors::OwoColorize;

use agent_plugins::extract::{ExtractOutcome, ExtractionReport};
use agent_plugins::link::{LinkOutcome, LinkState, SyncReport};
use agent_plugins::marketplace::{ManifestState, MarketplaceInfo, UpdateOutcome, UpdateResult};
use agent_plugins::status::{AgentCheck, StatusReport};
use agent_plugins::store::ArtifactCounts;
use agent_plugins::types::ArtifactKind;

/// Rendering options shared by every formatter.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub color: bool,
}

impl Output {
    pub fn heading(&self, title: &str) -> String {
        if self.color {
            format!("{}", title.bold().underline())
        } else {
            title.to_string()
        }
    }

    pub fn success(&self, message: &str) -> String {
        if self.color {
            format!("{} {message}", "✓".green())
        } else {
            format!("✓ {message}")
        }
    }

    pub fn warning(&self, message: &str) -> String {
        if self.color {
            format!("{} {message}", "!".yellow())
        } else {
            format!("! {message}")
        }
    }

    fn table(&self, header: Vec<&str>) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        if !self.color {
            table.force_no_tty();
        }
        table.set_header(header);
        table
    }

    pub fn sync_report(&self, report: &SyncReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Links"));
        if report.results.is_empty() {
            out.push_str("No enabled agents.\n");
        } else {
            let mut table = self.table(vec!["Agent", "Component", "Target", "Result"]);
            for result in &report.results {
                let color = match &result.outcome {
                    LinkOutcome::AlreadyLinked => Color::DarkGrey,
                    LinkOutcome::Conflict(_) => Color::Yellow,
                    LinkOutcome::Failed(_) => Color::Red,
                    _ => Color::Green,
                };
                let mut label = result.outcome.label();
                if let Some(backup) = &result.backup {
                    let _ = write!(label, ", backup at {}", backup.display());
                }
                table.add_row(vec![
                    Cell::new(result.entry.agent),
                    Cell::new(result.entry.component),
                    Cell::new(result.entry.target.display()),
                    Cell::new(label).fg(color),
                ]);
            }
            let _ = writeln!(out, "{table}");
        }
        for id in &report.unknown_agents {
            let _ = writeln!(out, "{}", self.warning(&format!("unknown agent '{id}'")));
        }
        if report
            .results
            .iter()
            .any(|r| matches!(r.outcome, LinkOutcome::Conflict(_)))
        {
            let _ = writeln!(
                out,
                "{}",
                self.warning("some targets already exist; rerun with --force (and --backup to keep them)")
            );
        }
        out
    }

    pub fn extraction(&self, report: &ExtractionReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}\n",
            self.heading(&format!("Extracted from {}", report.marketplace))
        );
        if report.items.is_empty() {
            out.push_str("No artifacts found.\n");
            return out;
        }
        let mut table = self.table(vec!["Kind", "Name", "Plugin", "Result"]);
        for item in &report.items {
            let color = match &item.outcome {
                ExtractOutcome::Installed | ExtractOutcome::Replaced => Color::Green,
                ExtractOutcome::Skipped(_) => Color::DarkGrey,
                ExtractOutcome::Failed(_) => Color::Red,
            };
            table.add_row(vec![
                Cell::new(item.kind),
                Cell::new(&item.name),
                Cell::new(item.plugin.as_deref().unwrap_or("-")),
                Cell::new(item.outcome.label()).fg(color),
            ]);
        }
        let _ = writeln!(out, "{table}");
        let _ = writeln!(
            out,
            "{} installed, {} replaced, {} skipped, {} failed",
            report.count(|o| *o == ExtractOutcome::Installed),
            report.count(|o| *o == ExtractOutcome::Replaced),
            report.count(|o| matches!(o, ExtractOutcome::Skipped(_))),
            report.count(ExtractOutcome::is_failure),
        );
        out
    }

    pub fn updates(&self, results: &[UpdateResult]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Marketplace updates"));
        if results.is_empty() {
            out.push_str("No marketplaces tracked.\n");
            return out;
        }
        let mut table = self.table(vec!["Marketplace", "Result"]);
        for result in results {
            let color = match result.outcome {
                UpdateOutcome::Failed(_) => Color::Red,
                _ => Color::Green,
            };
            table.add_row(vec![
                Cell::new(&result.name),
                Cell::new(&result.outcome).fg(color),
            ]);
        }
        let _ = writeln!(out, "{table}");
        out
    }

    pub fn status(&self, report: &StatusReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Canonical store"));
        let _ = writeln!(out, "  Root: {}", report.store_root.display());
        let _ = writeln!(
            out,
            "  Initialized: {}",
            if report.initialized { "yes" } else { "no (run init)" }
        );
        let _ = writeln!(out, "  Link mode: {}", report.sync_mode);
        let _ = writeln!(out, "  Artifacts: {}\n", counts_line(&report.counts));

        let _ = writeln!(out, "{}\n", self.heading("Agents"));
        let mut table = self.table(vec!["Agent", "Installed", "Enabled", "Links", "Home"]);
        for status in &report.agents {
            let links = if status.enabled {
                summarize_links(status.links.iter().map(|l| &l.state))
            } else {
                "-".to_string()
            };
            let installed = status.installation.is_installed();
            table.add_row(vec![
                Cell::new(status.agent.name),
                Cell::new(if installed { "yes" } else { "no" }).fg(if installed {
                    Color::Green
                } else {
                    Color::DarkGrey
                }),
                Cell::new(if status.enabled { "yes" } else { "no" }),
                Cell::new(links),
                Cell::new(status.agent.home),
            ]);
        }
        let _ = writeln!(out, "{table}");
        for id in &report.unknown_agents {
            let _ = writeln!(out, "{}", self.warning(&format!("unknown agent '{id}' in config")));
        }

        if !report.marketplaces.is_empty() {
            let names: Vec<_> = report.marketplaces.iter().map(|m| m.name.as_str()).collect();
            let _ = writeln!(out, "\nMarketplaces: {}", names.join(", "));
        }
        out
    }

    pub fn check(&self, checks: &[AgentCheck]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Agent detection"));
        let mut table = self.table(vec!["Agent", "CLI", "Home", "Components", "Installed"]);
        for check in checks {
            let cli = match (check.agent.cli, &check.cli_path) {
                (None, _) => "n/a (IDE)".to_string(),
                (Some(_), Some(path)) => path.display().to_string(),
                (Some(name), None) => format!("{name} not found"),
            };
            let components: Vec<String> = check.agent.components().map(|c| c.to_string()).collect();
            let installed = check.installation.is_installed();
            table.add_row(vec![
                Cell::new(check.agent.id),
                Cell::new(cli),
                Cell::new(if check.home_exists { "exists" } else { "missing" }),
                Cell::new(components.join(", ")),
                Cell::new(if installed { "yes" } else { "no" }).fg(if installed {
                    Color::Green
                } else {
                    Color::DarkGrey
                }),
            ]);
        }
        let _ = writeln!(out, "{table}");
        out
    }

    pub fn marketplaces(&self, infos: &[MarketplaceInfo]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Marketplaces"));
        if infos.is_empty() {
            out.push_str("No marketplaces tracked. Add one with 'agent-plugins marketplace add <org/repo>'.\n");
            return out;
        }
        let mut table = self.table(vec!["Name", "Plugins", "Description", "Source", "Synced"]);
        for info in infos {
            let (plugins, description) = match &info.manifest {
                ManifestState::Parsed(manifest) => (
                    manifest.plugins.len().to_string(),
                    manifest.description.clone().unwrap_or_default(),
                ),
                ManifestState::Missing => ("-".to_string(), String::new()),
                ManifestState::Malformed(_) => ("?".to_string(), "malformed manifest".to_string()),
            };
            let synced = info
                .record
                .synced_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            let name = if info.present {
                Cell::new(&info.record.name)
            } else {
                Cell::new(format!("{} (missing)", info.record.name)).fg(Color::Red)
            };
            table.add_row(vec![
                name,
                Cell::new(plugins),
                Cell::new(truncate(&description, 50)),
                Cell::new(&info.record.url),
                Cell::new(synced),
            ]);
        }
        let _ = writeln!(out, "{table}");
        out
    }

    /// Canonical artifacts by kind, then each marketplace's plugins.
    pub fn listing(
        &self,
        artifacts: &[(ArtifactKind, Vec<String>)],
        infos: &[MarketplaceInfo],
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.heading("Canonical artifacts"));
        for (kind, names) in artifacts {
            let _ = writeln!(out, "{} ({})", kind.dir_name(), names.len());
            for name in names {
                let _ = writeln!(out, "  {name}");
            }
        }

        for info in infos {
            let _ = writeln!(out, "\n{}", self.heading(&format!("Marketplace {}", info.record.name)));
            match &info.manifest {
                ManifestState::Parsed(manifest) if !manifest.plugins.is_empty() => {
                    for plugin in &manifest.plugins {
                        let description = plugin.description.as_deref().unwrap_or("");
                        let _ = writeln!(out, "  {} {}", plugin.name, truncate(description, 50));
                    }
                }
                ManifestState::Malformed(reason) => {
                    let _ = writeln!(out, "  ? {reason}");
                }
                _ => {
                    let _ = writeln!(out, "  (no manifest)");
                }
            }
        }
        out
    }
}

fn counts_line(counts: &ArtifactCounts) -> String {
    counts
        .iter()
        .map(|(kind, n)| format!("{n} {}", kind.dir_name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn summarize_links<'a>(states: impl Iterator<Item = &'a LinkState>) -> String {
    let mut healthy = 0;
    let mut total = 0;
    let mut problems = Vec::new();
    for state in states {
        total += 1;
        if state.is_healthy() {
            healthy += 1;
        } else if *state != LinkState::Absent {
            problems.push(state.label());
        }
    }
    let mut summary = format!("{healthy}/{total}");
    if !problems.is_empty() {
        problems.sort_unstable();
        problems.dedup();
        let _ = write!(summary, " ({})", problems.join(", "));
    }
    summary
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
