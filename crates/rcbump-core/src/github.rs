//! GitHub REST access for releases and tag refs.
//!
//! Shells out to `gh api` for all requests. This inherits whatever
//! authentication `gh` already has (`GH_TOKEN`, `GITHUB_TOKEN`, or a stored
//! login), so nothing here handles credentials.

use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// `gh` reports the HTTP status at the end of its error line, e.g.
/// `gh: Reference already exists (HTTP 422)`.
static HTTP_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(HTTP (\d{3})\)").expect("valid status regex"));

/// Errors from GitHub API calls.
#[derive(Error, Debug)]
pub enum GitHubError {
    /// Failed to execute the `gh` command.
    #[error("failed to run gh: {0}")]
    Exec(#[from] std::io::Error),

    /// The API returned an error.
    #[error("GitHub API {endpoint} failed: {message}")]
    Api {
        /// The endpoint that was called.
        endpoint: String,
        /// HTTP status, when `gh` reported one.
        status: Option<u16>,
        /// Captured error output.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        /// The endpoint that was called.
        endpoint: String,
        /// The JSON error.
        source: serde_json::Error,
    },
}

impl GitHubError {
    /// HTTP status code of an API error, if known.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the API rejected the request as unprocessable (HTTP 422).
    ///
    /// Creating a ref that already exists fails this way.
    pub const fn is_unprocessable(&self) -> bool {
        matches!(self.status(), Some(422))
    }
}

/// Result alias for GitHub operations.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repo {
    /// Owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl Repo {
    /// Create from owner and name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name` (the `GITHUB_REPOSITORY` format).
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, name) = slug.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The subset of a GitHub release this tool reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    /// Numeric release id.
    pub id: u64,
    /// Tag the release points at (e.g. `v1.2.0-rc.1`).
    pub tag_name: String,
    /// Release title.
    #[serde(default)]
    pub name: Option<String>,
    /// Release notes.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether the release is marked as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
}

/// Fields written when creating or updating a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDraft {
    /// Tag name.
    pub tag_name: String,
    /// Release title.
    pub name: String,
    /// Release notes.
    pub body: String,
    /// Mark as prerelease.
    pub prerelease: bool,
}

/// The release and git-ref endpoints the synchronizer needs.
pub trait ReleaseApi {
    /// List releases, newest first.
    fn list_releases(&self) -> GitHubResult<Vec<Release>>;

    /// Create a release.
    fn create_release(&self, draft: &ReleaseDraft) -> GitHubResult<Release>;

    /// Update the release with `id` in place.
    fn update_release(&self, id: u64, draft: &ReleaseDraft) -> GitHubResult<Release>;

    /// Create `refs/tags/<tag>` pointing at `sha`.
    fn create_tag_ref(&self, tag: &str, sha: &str) -> GitHubResult<()>;

    /// Force-move `tags/<tag>` to `sha`.
    fn update_tag_ref(&self, tag: &str, sha: &str) -> GitHubResult<()>;
}

/// [`ReleaseApi`] backed by the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    repo: Repo,
}

impl GhCli {
    /// Client for `repo`.
    pub const fn new(repo: Repo) -> Self {
        Self { repo }
    }

    /// The repository this client talks to.
    pub const fn repo(&self) -> &Repo {
        &self.repo
    }

    fn endpoint(&self, path: &str) -> String {
        format!("repos/{}/{}/{path}", self.repo.owner, self.repo.name)
    }

    fn release_fields(draft: &ReleaseDraft) -> Vec<String> {
        vec![
            "-f".into(),
            format!("tag_name={}", draft.tag_name),
            "-f".into(),
            format!("name={}", draft.name),
            "-f".into(),
            format!("body={}", draft.body),
            "-F".into(),
            format!("prerelease={}", draft.prerelease),
        ]
    }

    fn create_tag_ref_fields(tag: &str, sha: &str) -> Vec<String> {
        vec![
            "-f".into(),
            format!("ref=refs/tags/{tag}"),
            "-f".into(),
            format!("sha={sha}"),
        ]
    }

    fn update_tag_ref_fields(sha: &str) -> Vec<String> {
        vec![
            "-f".into(),
            format!("sha={sha}"),
            "-F".into(),
            "force=true".into(),
        ]
    }

    fn tag_ref_endpoint(&self, tag: &str) -> String {
        self.endpoint(&format!("git/refs/tags/{tag}"))
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, raw: &str) -> GitHubResult<T> {
        serde_json::from_str(raw).map_err(|source| GitHubError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

impl ReleaseApi for GhCli {
    #[instrument(skip(self), fields(repo = %self.repo))]
    fn list_releases(&self) -> GitHubResult<Vec<Release>> {
        let endpoint = self.endpoint("releases");
        let raw = gh_api("GET", &endpoint, &[])?;
        let releases: Vec<Release> = Self::decode(&endpoint, &raw)?;
        debug!(count = releases.len(), "listed releases");
        Ok(releases)
    }

    #[instrument(skip(self, draft), fields(repo = %self.repo, tag = %draft.tag_name))]
    fn create_release(&self, draft: &ReleaseDraft) -> GitHubResult<Release> {
        let endpoint = self.endpoint("releases");
        let raw = gh_api("POST", &endpoint, &Self::release_fields(draft))?;
        Self::decode(&endpoint, &raw)
    }

    #[instrument(skip(self, draft), fields(repo = %self.repo, tag = %draft.tag_name))]
    fn update_release(&self, id: u64, draft: &ReleaseDraft) -> GitHubResult<Release> {
        let endpoint = self.endpoint(&format!("releases/{id}"));
        let raw = gh_api("PATCH", &endpoint, &Self::release_fields(draft))?;
        Self::decode(&endpoint, &raw)
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    fn create_tag_ref(&self, tag: &str, sha: &str) -> GitHubResult<()> {
        let endpoint = self.endpoint("git/refs");
        gh_api("POST", &endpoint, &Self::create_tag_ref_fields(tag, sha))?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    fn update_tag_ref(&self, tag: &str, sha: &str) -> GitHubResult<()> {
        let endpoint = self.tag_ref_endpoint(tag);
        gh_api("PATCH", &endpoint, &Self::update_tag_ref_fields(sha))?;
        Ok(())
    }
}

/// Run `gh api` and return its stdout.
fn gh_api(method: &str, endpoint: &str, fields: &[String]) -> GitHubResult<String> {
    debug!(%method, %endpoint, "gh api");
    let output = Command::new("gh")
        .args(["api", "--method", method, endpoint])
        .args(["-H", "Accept: application/vnd.github+json"])
        .args(fields)
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GitHubError::Api {
            endpoint: endpoint.to_string(),
            status: parse_http_status(&stderr),
            message: stderr,
        })
    }
}

/// Pull the HTTP status out of `gh` error output.
fn parse_http_status(stderr: &str) -> Option<u16> {
    HTTP_STATUS_RE
        .captures(stderr)
        .and_then(|caps| caps[1].parse().ok())
}
