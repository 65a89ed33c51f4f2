//! Latest command: read the newest release's version and bump info.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rcbump_core::config::Config;
use rcbump_core::cycle;
use rcbump_core::release;

use super::RepoArgs;

/// Arguments for the `latest` subcommand.
#[derive(Args, Debug, Default)]
pub struct LatestArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
}

/// Fetch the latest release and publish it as `latest_release`.
#[instrument(name = "cmd_latest", skip_all)]
pub fn cmd_latest(args: LatestArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing latest command");

    let api = args.repo.client(config)?;
    let latest = release::latest_release(&api, &config.release.naming())
        .with_context(|| format!("failed to read releases of {}", api.repo()))?;

    super::progress(
        global_json,
        "Latest release",
        format!(
            "{} {}",
            latest.version.green(),
            latest.bump_info.to_json().dimmed()
        ),
    );
    super::emit(&cycle::latest_outputs(&latest), global_json)
}
