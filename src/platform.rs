//! Platform paths and binary lookup.
//!
//! Everything that would otherwise be process-wide implicit state (the
//! user's home, the canonical store location, the executable search path)
//! lives in [`Environment`], which is passed explicitly to every component.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};

/// Environment variable overriding the canonical store location.
pub const STORE_HOME_ENV: &str = "AGENT_PLUGINS_HOME";

/// Directory name of the canonical store inside the user's home.
const STORE_DIR_NAME: &str = ".agent";

/// Returns the current user's home directory.
///
/// # Errors
///
/// Returns [`Error::HomeDirNotFound`] if it cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(Error::HomeDirNotFound)
}

/// Resolved locations for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    home: PathBuf,
    store_root: PathBuf,
    search_path: Option<OsString>,
}

impl Environment {
    /// Builds an environment from explicit locations.
    ///
    /// Binary lookup uses the process `PATH` until [`with_search_path`]
    /// overrides it.
    ///
    /// [`with_search_path`]: Environment::with_search_path
    #[must_use]
    pub fn new(home: impl Into<PathBuf>, store_root: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            store_root: store_root.into(),
            search_path: None,
        }
    }

    /// Resolves the environment for the running user.
    ///
    /// The store root comes from `store_override` if given, then the
    /// `AGENT_PLUGINS_HOME` environment variable (absolute paths only), and
    /// finally `~/.agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// override cannot be made absolute.
    pub fn detect(store_override: Option<&Path>) -> Result<Self> {
        let home = home_dir()?;

        let store_root = if let Some(path) = store_override {
            std::path::absolute(path).at(path)?
        } else if let Some(path) = std::env::var_os(STORE_HOME_ENV)
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
        {
            path
        } else {
            home.join(STORE_DIR_NAME)
        };

        Ok(Self::new(home, store_root))
    }

    /// Replaces the executable search path used by [`find_binary`].
    ///
    /// [`find_binary`]: Environment::find_binary
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// The user's home directory, the base of every agent home.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Root of the canonical store (`~/.agent` by default).
    #[must_use]
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Resolves an executable on the search path.
    #[must_use]
    pub fn find_binary(&self, name: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => which::which_in(name, Some(paths), &self.home).ok(),
            None => which::which(name).ok(),
        }
    }
}
