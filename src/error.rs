//! Error types for agent-plugins operations.

use std::path::PathBuf;

/// Errors that can occur while managing the canonical store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A link or artifact target already exists and force was not requested.
    #[error("conflict: {0} already exists (use --force to replace)")]
    Conflict(PathBuf),

    /// A referenced agent, marketplace or artifact is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// The item being added is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A single filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A git or HTTP operation failed.
    #[error("network error: {0}")]
    Network(String),

    /// Cloning a marketplace repository failed.
    #[error("failed to clone {url}: {reason}")]
    CloneFailed {
        /// Source URL of the clone.
        url: String,
        /// Git's reason, usually its stderr.
        reason: String,
    },

    /// The config file is unreadable or malformed.
    #[error("corrupt state in {path}: {reason}")]
    CorruptState {
        /// Path of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid user input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The user's home directory could not be determined.
    #[error("home directory not found")]
    HomeDirNotFound,

    /// The operation is not available on this platform.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// JSON (de)serialization failed.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML front-matter parsing failed.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors that abort the whole invocation.
    ///
    /// Every other error is recorded against a single item and the batch
    /// carries on.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptState { .. } | Self::InvalidArgument(_))
    }
}

/// Result type alias for agent-plugins operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attaches a path to `std::io::Result` values.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_corrupt_state_and_arguments_are_fatal() {
        let corrupt = Error::CorruptState {
            path: PathBuf::from("/x/config.json"),
            reason: "bad".to_string(),
        };
        assert!(corrupt.is_fatal());
        assert!(Error::InvalidArgument("x".to_string()).is_fatal());
        assert!(!Error::NotFound("x".to_string()).is_fatal());
        assert!(!Error::Network("timeout".to_string()).is_fatal());
        assert!(!Error::Conflict(PathBuf::from("/x")).is_fatal());
    }

    #[test]
    fn io_error_mentions_path() {
        let err = Error::io(
            "/tmp/target",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/target"));
        assert!(message.contains("denied"));
    }
}
