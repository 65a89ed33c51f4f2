//! Classify command: derive a bump level from recent commits.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rcbump_core::config::Config;
use rcbump_core::cycle;
use rcbump_core::git;
use rcbump_core::release::LatestRelease;
use rcbump_core::version::conventional::{self, SubjectMatch};

/// Arguments for the `classify` subcommand.
#[derive(Args, Debug, Default)]
pub struct ClassifyArgs {
    /// Latest-release payload whose bump info the result is merged into
    #[arg(long, env = "latest_release", value_name = "JSON")]
    pub latest_release: Option<String>,

    /// Number of commits to inspect (default from config: 3)
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,

    /// Which commit subjects the feat and `!` patterns see
    #[arg(long, value_enum)]
    pub subject_match: Option<SubjectMatch>,
}

/// Classify the last commits and publish `bump_type` and `new_bump_info`.
#[instrument(name = "cmd_classify", skip_all)]
pub fn cmd_classify(args: ClassifyArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let count = args.count.unwrap_or(config.commits.count);
    let mode = args.subject_match.unwrap_or(config.commits.subject_match);
    debug!(json_output = global_json, count, %mode, "executing classify command");

    let latest = match args.latest_release.as_deref() {
        Some(raw) => LatestRelease::from_payload(raw).context("invalid latest_release")?,
        None => LatestRelease::default(),
    };

    let commits = git::recent_commits(count).context("failed to read commit log")?;
    let level = conventional::classify(&commits, mode);
    let merged = latest.bump_info.merge(level);

    super::progress(
        global_json,
        "Bump type",
        format!(
            "{} ({} commits inspected)",
            level.as_str().green(),
            commits.len()
        ),
    );
    super::emit(&cycle::classify_outputs(level, &merged), global_json)
}
