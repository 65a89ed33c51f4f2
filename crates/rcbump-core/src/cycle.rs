//! The full release-candidate cycle in one pass.
//!
//! Runs the same steps the individual commands do, in order:
//!
//! 1. **Latest**: read the newest release and its bump info.
//! 2. **Classify**: derive a bump level from recent commits.
//! 3. **Next**: compute the next candidate version and merged bump info.
//! 4. **Sync**: create or update the candidate release and move its tag.
//!
//! With [`CycleOptions::dry_run`] the sync is planned but not executed, so
//! nothing is written to GitHub.
//!
//! The `*_outputs` helpers build the CI outputs each step publishes; the
//! single-step commands use them too.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::bump::{self, BumpInfo, BumpPlan};
use crate::github::ReleaseApi;
use crate::output::Outputs;
use crate::release::{
    self, LatestRelease, ReleaseAction, ReleaseError, ReleaseNaming, SyncPlan, SyncRequest,
    TagRefAction,
};
use crate::version::conventional::{self, Commit, SubjectMatch};
use crate::version::{BumpLevel, VersionError};

/// Errors from a cycle run.
#[derive(Error, Debug)]
pub enum CycleError {
    /// Reading or writing release state failed.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// The latest version could not be parsed.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Result alias for cycle operations.
pub type CycleResult<T> = Result<T, CycleError>;

/// Options controlling a cycle run.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Plan the sync without writing to GitHub.
    pub dry_run: bool,
    /// How commit subjects are matched.
    pub subject_match: SubjectMatch,
}

/// Inputs gathered from the checkout.
#[derive(Debug, Clone)]
pub struct CycleInput {
    /// Recent commits, newest first.
    pub commits: Vec<Commit>,
    /// Commit the candidate tag points at.
    pub sha: String,
}

/// Steps of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Read the latest release.
    Latest,
    /// Classify recent commits.
    Classify,
    /// Compute the next version.
    Next,
    /// Write the candidate release and tag.
    Sync,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Classify => write!(f, "classify"),
            Self::Next => write!(f, "next"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// Events emitted during a cycle for progress reporting.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    /// A phase has started.
    PhaseStarted(CyclePhase),
    /// A phase has completed.
    PhaseCompleted(CyclePhase, PhaseOutcome),
}

/// Outcome of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Phase was skipped.
    Skipped {
        /// Why the phase was skipped.
        reason: String,
    },
}

/// What the sync step did, or would have done.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Create or update.
    pub action: ReleaseAction,
    /// Tag name.
    pub tag: String,
    /// How the tag ref was written; `None` in a dry run.
    pub tag_ref: Option<TagRefAction>,
    /// Release id; `None` in a dry run that would create one.
    pub release_id: Option<u64>,
}

/// Outcome of the full cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    /// The latest release as read from GitHub.
    pub latest: LatestRelease,
    /// The version plan.
    pub plan: BumpPlan,
    /// The sync result.
    pub sync: SyncSummary,
    /// Results of each phase.
    pub phases: Vec<(CyclePhase, PhaseOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl CycleOutcome {
    /// Every output the individual steps would have published.
    pub fn outputs(&self) -> Outputs {
        let mut outputs = latest_outputs(&self.latest);
        outputs.merge(&classify_outputs(self.plan.level, &self.plan.bump_info));
        outputs.merge(&next_outputs(&self.plan));
        outputs.merge(&sync_outputs(&self.sync.tag, &self.sync.action));
        if self.dry_run {
            outputs.set("dry_run", "true");
        }
        outputs
    }
}

/// Run latest, classify, next, and sync against `api`.
///
/// Calls `on_event` at phase boundaries so the CLI can update its
/// progress display.
#[instrument(skip_all, fields(commits = input.commits.len(), dry_run = options.dry_run))]
pub fn run_cycle(
    api: &dyn ReleaseApi,
    naming: &ReleaseNaming,
    input: &CycleInput,
    options: &CycleOptions,
    mut on_event: impl FnMut(CycleEvent),
) -> CycleResult<CycleOutcome> {
    let mut phases = Vec::new();

    on_event(CycleEvent::PhaseStarted(CyclePhase::Latest));
    let latest = release::latest_release(api, naming)?;
    complete(
        &mut phases,
        CyclePhase::Latest,
        PhaseOutcome::Success {
            message: format!("latest release is {}", latest.version),
        },
        &mut on_event,
    );

    on_event(CycleEvent::PhaseStarted(CyclePhase::Classify));
    let level = conventional::classify(&input.commits, options.subject_match);
    complete(
        &mut phases,
        CyclePhase::Classify,
        PhaseOutcome::Success {
            message: format!("{} commits → {level}", input.commits.len()),
        },
        &mut on_event,
    );

    on_event(CycleEvent::PhaseStarted(CyclePhase::Next));
    let plan = bump::plan_bump(&latest, level)?;
    complete(
        &mut phases,
        CyclePhase::Next,
        PhaseOutcome::Success {
            message: format!("{} → {}", plan.previous, plan.next),
        },
        &mut on_event,
    );

    on_event(CycleEvent::PhaseStarted(CyclePhase::Sync));
    let request = SyncRequest {
        version: plan.next.clone(),
        sha: input.sha.clone(),
        bump_info: plan.bump_info.clone(),
    };
    let sync_plan = release::plan_sync(api, naming, &request)?;
    let sync = if options.dry_run {
        let summary = dry_run_summary(&sync_plan);
        complete(
            &mut phases,
            CyclePhase::Sync,
            PhaseOutcome::Skipped {
                reason: format!(
                    "dry run: would {} release {}",
                    summary.action.verb(),
                    summary.tag
                ),
            },
            &mut on_event,
        );
        summary
    } else {
        let outcome = sync_plan.execute(api)?;
        let summary = SyncSummary {
            action: outcome.action,
            tag: outcome.tag,
            tag_ref: Some(outcome.tag_ref),
            release_id: Some(outcome.release.id),
        };
        complete(
            &mut phases,
            CyclePhase::Sync,
            PhaseOutcome::Success {
                message: format!("{} release {}", summary.action.as_str(), summary.tag),
            },
            &mut on_event,
        );
        summary
    };

    info!(version = %plan.next, %level, dry_run = options.dry_run, "cycle complete");
    Ok(CycleOutcome {
        latest,
        plan,
        sync,
        phases,
        dry_run: options.dry_run,
    })
}

fn complete(
    phases: &mut Vec<(CyclePhase, PhaseOutcome)>,
    phase: CyclePhase,
    outcome: PhaseOutcome,
    on_event: &mut impl FnMut(CycleEvent),
) {
    on_event(CycleEvent::PhaseCompleted(phase, outcome.clone()));
    phases.push((phase, outcome));
}

fn dry_run_summary(plan: &SyncPlan) -> SyncSummary {
    let release_id = match &plan.action {
        ReleaseAction::Update { id, .. } => Some(*id),
        ReleaseAction::Create => None,
    };
    SyncSummary {
        action: plan.action.clone(),
        tag: plan.tag.clone(),
        tag_ref: None,
        release_id,
    }
}

/// Outputs of the `latest` step.
pub fn latest_outputs(latest: &LatestRelease) -> Outputs {
    let mut outputs = Outputs::new();
    outputs.set("latest_release", latest.to_payload());
    outputs
}

/// Outputs of the `classify` step.
pub fn classify_outputs(level: BumpLevel, merged: &BumpInfo) -> Outputs {
    let mut outputs = Outputs::new();
    outputs
        .set("bump_type", level.as_str())
        .set("new_bump_info", merged.to_json());
    outputs
}

/// Outputs of the `next` step.
pub fn next_outputs(plan: &BumpPlan) -> Outputs {
    let mut outputs = Outputs::new();
    outputs
        .set("new_version", plan.next.to_string())
        .set("bump_info", plan.bump_info.to_json());
    outputs
}

/// Outputs of the `sync` step.
pub fn sync_outputs(tag: &str, action: &ReleaseAction) -> Outputs {
    let mut outputs = Outputs::new();
    outputs
        .set("tag", tag)
        .set("release_action", action.as_str());
    outputs
}
