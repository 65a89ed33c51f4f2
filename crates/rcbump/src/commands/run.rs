//! Run command: thin CLI layer over `rcbump_core::cycle`.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rcbump_core::config::Config;
use rcbump_core::cycle::{self, CycleEvent, CycleInput, CycleOptions, PhaseOutcome};
use rcbump_core::git;
use rcbump_core::version::conventional::SubjectMatch;

use super::RepoArgs;

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Commit the tag should point at (default: HEAD)
    #[arg(long, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    /// Number of commits to inspect (default from config: 3)
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,

    /// Which commit subjects the feat and `!` patterns see
    #[arg(long, value_enum)]
    pub subject_match: Option<SubjectMatch>,

    /// Read everything, write nothing
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the full cycle and publish every step's outputs.
#[instrument(name = "cmd_run", skip_all, fields(dry_run = args.dry_run))]
pub fn cmd_run(args: RunArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing run command");

    let count = args.count.unwrap_or(config.commits.count);
    let input = CycleInput {
        commits: git::recent_commits(count).context("failed to read commit log")?,
        sha: super::resolve_sha(args.sha)?,
    };
    let options = CycleOptions {
        dry_run: args.dry_run,
        subject_match: args.subject_match.unwrap_or(config.commits.subject_match),
    };
    let api = args.repo.client(config)?;

    if options.dry_run && !global_json {
        eprintln!("{}", "DRY RUN: nothing will be written".yellow().bold());
    }

    let outcome = cycle::run_cycle(&api, &config.release.naming(), &input, &options, |event| {
        if !global_json {
            handle_event(event, options.dry_run);
        }
    })
    .with_context(|| format!("release-candidate cycle failed for {}", api.repo()))?;

    if !global_json {
        eprintln!(
            "{} {} → {}",
            "✓".green().bold(),
            outcome.plan.previous.to_string().dimmed(),
            outcome.plan.next.to_string().green().bold(),
        );
    }
    super::emit(&outcome.outputs(), global_json)
}

/// Handle a cycle event for terminal progress display.
fn handle_event(event: CycleEvent, is_dry: bool) {
    match event {
        CycleEvent::PhaseStarted(phase) => {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                spinner.set_style(style);
            }
            spinner.set_message(format!("{phase}..."));
            spinner.finish_and_clear();
        }
        CycleEvent::PhaseCompleted(phase, outcome) => match outcome {
            PhaseOutcome::Success { message } => {
                let prefix = if is_dry { "○" } else { "✓" };
                eprintln!(
                    "  {} {} {}",
                    prefix.green(),
                    phase.to_string().bold(),
                    message.dimmed(),
                );
            }
            PhaseOutcome::Skipped { reason } => {
                eprintln!(
                    "  {} {} {}",
                    "–".yellow(),
                    phase.to_string().bold(),
                    reason.dimmed(),
                );
            }
        },
    }
}
