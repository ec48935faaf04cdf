#![doc = include_str!("../README.md")]
//!
//! ## Modules
//!
//! - [`agent`] - Registry of supported agents and their layouts
//! - [`store`] - The canonical store and its config file
//! - [`link`] - Link reconciliation between agents and the store
//! - [`extract`] - Marketplace artifact ingestion
//! - [`marketplace`] - Marketplace clones
//! - [`command`] - Command parsing and format projection
//! - [`status`] - Read-only status reporting
//! - [`error`] - Error types

pub mod agent;
pub mod command;
pub mod error;
pub mod extract;
pub mod fsutil;
pub mod link;
pub mod logging;
pub mod marketplace;
pub mod platform;
pub mod status;
pub mod store;
pub mod types;
pub mod update;

pub use agent::AgentDefinition;
pub use command::CommandDocument;
pub use error::{Error, Result};
pub use extract::{ExtractionEngine, ExtractionReport};
pub use link::{LinkManager, LinkOutcome, LinkState, SyncReport};
pub use marketplace::MarketplaceManager;
pub use platform::Environment;
pub use status::StatusReporter;
pub use store::{CanonicalConfig, CanonicalStore, MarketplaceRecord};
pub use types::{ArtifactKind, CommandFormat, Component, LinkMode};
