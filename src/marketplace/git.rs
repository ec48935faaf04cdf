//! Bounded, non-interactive git subprocesses.

use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Upper bound for a shallow clone.
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound for a fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Local git operations against marketplace checkouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl Git {
    /// Shallow-clones `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CloneFailed`] with git's stderr on failure, or
    /// [`Error::Network`] when the clone exceeds [`CLONE_TIMEOUT`].
    pub fn clone_shallow(&self, url: &str, dest: &Path) -> Result<()> {
        let args: [&OsStr; 6] = [
            "clone".as_ref(),
            "--quiet".as_ref(),
            "--depth".as_ref(),
            "1".as_ref(),
            url.as_ref(),
            dest.as_os_str(),
        ];
        self.run(None, &args, CLONE_TIMEOUT).map_err(|e| match e {
            Failure::Exited(reason) => Error::CloneFailed {
                url: url.to_string(),
                reason,
            },
            other => other.into(),
        })
    }

    /// Moves a checkout to the head of the remote's default branch,
    /// discarding local changes.
    pub fn update(&self, repo: &Path) -> Result<()> {
        let fetch: [&OsStr; 6] = [
            "fetch".as_ref(),
            "--quiet".as_ref(),
            "--depth".as_ref(),
            "1".as_ref(),
            "origin".as_ref(),
            "HEAD".as_ref(),
        ];
        self.run(Some(repo), &fetch, FETCH_TIMEOUT)?;
        let reset: [&OsStr; 4] = [
            "reset".as_ref(),
            "--quiet".as_ref(),
            "--hard".as_ref(),
            "FETCH_HEAD".as_ref(),
        ];
        self.run(Some(repo), &reset, FETCH_TIMEOUT)?;
        Ok(())
    }

    fn run(
        &self,
        cwd: Option<&Path>,
        args: &[&OsStr],
        timeout: Duration,
    ) -> std::result::Result<(), Failure> {
        let mut command = Command::new("git");
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        debug!(?args, cwd = ?cwd, "running git");

        let child = command
            .spawn()
            .map_err(|e| Failure::Spawn(e.to_string()))?;
        wait_with_stderr(child, timeout)
    }
}

/// Waits for `child`, killing it after `timeout`. Stderr is drained on a
/// separate thread so a child that writes more than a pipe buffer never
/// blocks.
fn wait_with_stderr(mut child: Child, timeout: Duration) -> std::result::Result<(), Failure> {
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        outcome => {
            // The reader is left detached: grandchildren may still hold the pipe.
            let _ = child.kill();
            let _ = child.wait();
            return Err(match outcome {
                Err(e) => Failure::Spawn(e.to_string()),
                Ok(_) => Failure::TimedOut(timeout),
            });
        }
    };

    let stderr = stderr_reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();
    if status.success() {
        return Ok(());
    }
    let reason = match stderr.trim() {
        "" => format!("git exited with {status}"),
        text => text.to_string(),
    };
    Err(Failure::Exited(reason))
}

enum Failure {
    Spawn(String),
    TimedOut(Duration),
    Exited(String),
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Spawn(reason) => Error::Network(format!("failed to run git: {reason}")),
            Failure::TimedOut(limit) => {
                Error::Network(format!("git timed out after {}s", limit.as_secs()))
            }
            Failure::Exited(reason) => Error::Network(reason),
        }
    }
}

/// Returns `true` if a `git` binary is available.
#[must_use]
pub fn available() -> bool {
    which::which("git").is_ok()
}
