//! The static agent table.
//!
//! Supporting a new agent means adding a record here; nothing else in the
//! crate matches on agent identifiers.

use crate::types::CommandFormat;

use super::{AgentDefinition, ComponentDirs};

const NONE: ComponentDirs = ComponentDirs {
    skills: None,
    commands: None,
    agents: None,
    hooks: None,
    marketplaces: None,
};

pub(super) static AGENTS: &[AgentDefinition] = &[
    AgentDefinition {
        id: "claude",
        name: "Claude Code",
        home: ".claude",
        cli: Some("claude"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("commands"),
            agents: Some("agents"),
            hooks: Some("hooks"),
            marketplaces: Some("plugins/marketplaces"),
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "opencode",
        name: "OpenCode",
        home: ".config/opencode",
        cli: Some("opencode"),
        dirs: ComponentDirs {
            skills: Some("skill"),
            commands: Some("command"),
            agents: Some("agent"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "codex",
        name: "OpenAI Codex",
        home: ".codex",
        cli: Some("codex"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("prompts"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "gemini",
        name: "Gemini CLI",
        home: ".gemini",
        cli: Some("gemini"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Toml,
    },
    AgentDefinition {
        id: "qwen",
        name: "Qwen Code",
        home: ".qwen",
        cli: Some("qwen"),
        dirs: ComponentDirs {
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Toml,
    },
    AgentDefinition {
        id: "cursor",
        name: "Cursor",
        home: ".cursor",
        cli: None,
        dirs: ComponentDirs {
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "windsurf",
        name: "Windsurf",
        home: ".codeium/windsurf",
        cli: None,
        dirs: ComponentDirs {
            commands: Some("global_workflows"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "copilot",
        name: "GitHub Copilot CLI",
        home: ".copilot",
        cli: Some("copilot"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            agents: Some("agents"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "amp",
        name: "Amp",
        home: ".config/amp",
        cli: Some("amp"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "goose",
        name: "Goose",
        home: ".config/goose",
        cli: Some("goose"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "droid",
        name: "Factory Droid",
        home: ".factory",
        cli: Some("droid"),
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("commands"),
            agents: Some("droids"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "kilocode",
        name: "Kilo Code",
        home: ".kilocode",
        cli: None,
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("workflows"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "roo",
        name: "Roo Code",
        home: ".roo",
        cli: None,
        dirs: ComponentDirs {
            skills: Some("skills"),
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
    AgentDefinition {
        id: "auggie",
        name: "Auggie CLI",
        home: ".augment",
        cli: Some("auggie"),
        dirs: ComponentDirs {
            commands: Some("commands"),
            ..NONE
        },
        command_format: CommandFormat::Markdown,
    },
];
