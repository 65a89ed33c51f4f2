//! Sync command: create or update the release-candidate release and tag.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rcbump_core::config::Config;
use rcbump_core::cycle;
use rcbump_core::release::{self, SyncRequest};
use rcbump_core::version;

use super::RepoArgs;

/// Arguments for the `sync` subcommand.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// The new release-candidate version (e.g. 1.3.0-rc.1)
    #[arg(long = "version", env = "new_version", value_name = "VERSION")]
    pub new_version: String,

    /// Bump info to embed in the release notes
    #[arg(long, env = "bump_info", value_name = "JSON")]
    pub bump_info: String,

    /// Commit the tag should point at (default: HEAD)
    #[arg(long, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Show what would be written without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Sync the candidate release and publish `tag` and `release_action`.
#[instrument(name = "cmd_sync", skip_all, fields(version = %args.new_version, dry_run = args.dry_run))]
pub fn cmd_sync(args: SyncArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing sync command");

    let request = SyncRequest {
        version: version::parse_version(&args.new_version)?,
        sha: super::resolve_sha(args.sha)?,
        bump_info: release::parse_bump_info_json(&args.bump_info).context("invalid bump_info")?,
    };
    let api = args.repo.client(config)?;
    let naming = config.release.naming();

    let plan = release::plan_sync(&api, &naming, &request)
        .with_context(|| format!("failed to read releases of {}", api.repo()))?;

    if args.dry_run {
        super::progress(
            global_json,
            "Dry run",
            format!(
                "would {} {} at {}",
                plan.action.verb(),
                plan.tag.green(),
                plan.sha.dimmed()
            ),
        );
        return super::emit(&cycle::sync_outputs(&plan.tag, &plan.action), global_json);
    }

    let outcome = plan
        .execute(&api)
        .with_context(|| format!("failed to sync release candidate on {}", api.repo()))?;

    super::progress(
        global_json,
        "Release candidate",
        format!(
            "{} {} ({})",
            outcome.action.as_str(),
            outcome.tag.green().bold(),
            outcome.tag_ref.as_str()
        ),
    );
    super::emit(
        &cycle::sync_outputs(&outcome.tag, &outcome.action),
        global_json,
    )
}
