//! Command implementations

pub mod classify;

pub mod doctor;

pub mod info;

pub mod latest;

pub mod next;

pub mod run;

pub mod sync;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::debug;

use rcbump_core::config::{self, Config};
use rcbump_core::git;
use rcbump_core::github::{GhCli, Repo};
use rcbump_core::output::{self, Outputs};

/// Repository selection shared by commands that talk to GitHub.
#[derive(Args, Debug, Default, Clone)]
pub struct RepoArgs {
    /// Repository as OWNER/NAME (falls back to config, then the `origin` remote)
    #[arg(long, env = "GITHUB_REPOSITORY", value_name = "OWNER/NAME")]
    pub repo: Option<String>,
}

impl RepoArgs {
    /// Resolve the repository: flag/env, then `github.repository`, then `origin`.
    pub fn resolve(&self, config: &Config) -> anyhow::Result<Repo> {
        if let Some(ref slug) = self.repo {
            return Repo::parse(slug)
                .with_context(|| format!("invalid repository {slug:?}, expected OWNER/NAME"));
        }
        if let Some(repo) = config.github.repo() {
            debug!(%repo, "repository from config");
            return Ok(repo);
        }
        match git::origin_repo().context("failed to read the origin remote")? {
            Some(repo) => {
                debug!(%repo, "repository from origin remote");
                Ok(repo)
            }
            None => bail!("no repository given; pass --repo or set GITHUB_REPOSITORY"),
        }
    }

    /// A `gh`-backed API client for the resolved repository.
    pub fn client(&self, config: &Config) -> anyhow::Result<GhCli> {
        Ok(GhCli::new(self.resolve(config)?))
    }
}

/// The commit to tag: `--sha`/`GITHUB_SHA`, else `HEAD`.
pub fn resolve_sha(sha: Option<String>) -> anyhow::Result<String> {
    match sha {
        Some(sha) if !sha.trim().is_empty() => Ok(sha.trim().to_string()),
        _ => git::head_sha().context("failed to resolve HEAD"),
    }
}

/// The config file in effect: `--config` when given, else the discovered
/// project config.
pub fn effective_config_file(explicit: Option<&Utf8Path>, cwd: &Utf8Path) -> Option<Utf8PathBuf> {
    explicit
        .map(Utf8Path::to_path_buf)
        .or_else(|| config::find_project_config(cwd))
}

/// Publish step outputs.
///
/// Outputs are appended to `$GITHUB_OUTPUT` when it is set. On stdout they
/// are printed as a JSON object with `--json`, otherwise as `key=value`
/// lines when there is no output file to receive them.
pub fn emit(outputs: &Outputs, global_json: bool) -> anyhow::Result<()> {
    let output_file = output::github_output_path();
    if let Some(ref path) = output_file {
        outputs.append_to_file(path)?;
        debug!(%path, "outputs appended");
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outputs.to_json())?);
    } else if output_file.is_none() {
        print!("{}", outputs.render());
    }
    Ok(())
}

/// Print a progress line to stderr (suppressed in JSON mode).
pub fn progress(global_json: bool, label: &str, message: impl std::fmt::Display) {
    if !global_json {
        eprintln!("{} {message}", format!("{label}:").bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_config_file_wins_over_discovery() {
        let tmp = TempDir::new().unwrap();
        let cwd = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(cwd.join(".rcbump.toml"), "log_level = \"debug\"\n").unwrap();
        let explicit = cwd.join("ci.toml");

        assert_eq!(
            effective_config_file(Some(&explicit), &cwd),
            Some(explicit.clone())
        );
        assert_eq!(
            effective_config_file(None, &cwd),
            Some(cwd.join(".rcbump.toml"))
        );
    }
}
