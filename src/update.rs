//! Checks crates.io for a newer release.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Version of this build.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const REGISTRY_URL: &str = "https://crates.io/api/v1/crates";
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_stable_version: Option<String>,
    max_version: String,
}

/// Result of comparing this build with the newest published release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub current: String,
    pub latest: String,
}

impl VersionCheck {
    /// Returns `true` if the published release is newer than this build.
    #[must_use]
    pub fn update_available(&self) -> bool {
        match (parse_version(&self.latest), parse_version(&self.current)) {
            (Some(latest), Some(current)) => latest > current,
            _ => false,
        }
    }
}

/// Asks crates.io for the newest stable version.
///
/// # Errors
///
/// Returns [`Error::Network`] if the request fails or times out, or a parse
/// error for an unexpected response.
pub fn check_latest() -> Result<VersionCheck> {
    let agent = ureq::AgentBuilder::new()
        .timeout(TIMEOUT)
        .user_agent(&format!("{CRATE_NAME}/{CURRENT_VERSION}"))
        .build();
    let url = format!("{REGISTRY_URL}/{CRATE_NAME}");
    debug!(%url, "checking for updates");

    let body = agent
        .get(&url)
        .call()
        .map_err(|e| Error::Network(e.to_string()))?
        .into_string()
        .map_err(|e| Error::Network(e.to_string()))?;

    latest_from_response(&body)
}

fn latest_from_response(body: &str) -> Result<VersionCheck> {
    let response: CrateResponse = serde_json::from_str(body)?;
    let latest = response
        .krate
        .max_stable_version
        .unwrap_or(response.krate.max_version);
    Ok(VersionCheck {
        current: CURRENT_VERSION.to_string(),
        latest,
    })
}

/// Parses `major.minor.patch`, ignoring pre-release and build suffixes.
fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let core = version.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next()?;
    let mut parts = core.split('.').map(|p| p.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    Some((major, minor, patch))
}
