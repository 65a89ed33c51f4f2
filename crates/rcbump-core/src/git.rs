//! Git operations used to classify commits and locate the repository.
//!
//! Shells out to `git` for all operations, so the checkout's own
//! configuration (shallow clones, safe directories, etc.) applies.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::Repo;
use crate::version::conventional::{self, Commit, LOG_FORMAT};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "log").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// The last `count` commits reachable from `HEAD`, newest first.
#[instrument]
pub fn recent_commits(count: usize) -> GitResult<Vec<Commit>> {
    let output = git(&[
        "log",
        &format!("--max-count={count}"),
        &format!("--format={LOG_FORMAT}"),
    ])?;
    let commits = conventional::parse_log(&output);
    debug!(count = commits.len(), "recent commits");
    Ok(commits)
}

/// Full SHA of `HEAD`.
#[instrument]
pub fn head_sha() -> GitResult<String> {
    let sha = git(&["rev-parse", "HEAD"])?.trim().to_string();
    debug!(%sha, "HEAD");
    Ok(sha)
}

/// Get the remote URL for a named remote (default: `"origin"`).
#[instrument]
pub fn remote_url(remote: &str) -> GitResult<Option<String>> {
    let result = git(&["remote", "get-url", remote]);
    match result {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// The GitHub repository `origin` points at, if it can be parsed.
pub fn origin_repo() -> GitResult<Option<Repo>> {
    Ok(remote_url("origin")?.as_deref().and_then(parse_owner_repo))
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<Repo> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some(Repo::new(owner, repo))
}

/// Check if we're inside a git repository.
#[instrument]
pub fn is_inside_repo() -> GitResult<bool> {
    let result = git(&["rev-parse", "--is-inside-work-tree"]);
    match result {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run a git command and return its stdout.
fn git(args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run inside or outside a checkout; repo-dependent assertions
    // only apply when the tests happen to run inside one.

    #[test]
    fn is_inside_repo_returns_bool() {
        assert!(is_inside_repo().is_ok());
    }

    #[test]
    fn recent_commits_works_in_repo() {
        if is_inside_repo().unwrap_or(false) {
            let result = recent_commits(3);
            assert!(result.is_ok());
            assert!(result.unwrap().len() <= 3);
        }
    }

    #[test]
    fn head_sha_is_hex_in_repo() {
        if is_inside_repo().unwrap_or(false)
            && let Ok(sha) = head_sha()
        {
            assert!(sha.len() >= 40);
            assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn git_error_on_bad_command() {
        assert!(git(&["not-a-real-subcommand"]).is_err());
    }

    #[test]
    fn parse_owner_repo_https() {
        let result = parse_owner_repo("https://github.com/octo/widgets.git");
        assert_eq!(result, Some(Repo::new("octo", "widgets")));
    }

    #[test]
    fn parse_owner_repo_https_no_suffix() {
        let result = parse_owner_repo("https://github.com/octo/widgets");
        assert_eq!(result, Some(Repo::new("octo", "widgets")));
    }

    #[test]
    fn parse_owner_repo_ssh() {
        let result = parse_owner_repo("git@github.com:octo/widgets.git");
        assert_eq!(result, Some(Repo::new("octo", "widgets")));
    }

    #[test]
    fn parse_owner_repo_invalid() {
        assert!(parse_owner_repo("not-a-url").is_none());
        assert!(parse_owner_repo("").is_none());
    }
}
