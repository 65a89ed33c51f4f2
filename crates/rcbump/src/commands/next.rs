//! Next command: compute the next release-candidate version.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rcbump_core::bump;
use rcbump_core::cycle;
use rcbump_core::release::LatestRelease;
use rcbump_core::version::BumpLevel;

/// Arguments for the `next` subcommand.
#[derive(Args, Debug)]
pub struct NextArgs {
    /// Latest-release payload (`{"version": …, "bumpInfo": {…}}`)
    #[arg(long, env = "latest_release", value_name = "JSON")]
    pub latest_release: String,

    /// Bump level derived from the commits
    #[arg(long, env = "BUMP_TYPE", value_enum)]
    pub bump_type: BumpLevel,
}

/// Compute the next version and publish `new_version` and `bump_info`.
#[instrument(name = "cmd_next", skip_all, fields(bump_type = %args.bump_type))]
pub fn cmd_next(args: NextArgs, global_json: bool) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing next command");

    let latest =
        LatestRelease::from_payload(&args.latest_release).context("invalid latest_release")?;
    let plan = bump::plan_bump(&latest, args.bump_type)?;

    super::progress(
        global_json,
        "Next version",
        format!(
            "{} → {} ({})",
            plan.previous.to_string().dimmed(),
            plan.next.to_string().green().bold(),
            plan.level
        ),
    );
    super::emit(&cycle::next_outputs(&plan), global_json)
}
