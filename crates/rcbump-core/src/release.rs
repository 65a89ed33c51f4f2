//! Release-candidate state: reading it back from GitHub and writing it out.
//!
//! The bump-info record travels between CI runs inside the release notes of
//! the release-candidate release, on a line of the form
//!
//! ```text
//! BUMP_INFO: {"major":false,"minor":true,"patch":true}
//! ```
//!
//! [`latest_release`] reads it back; [`sync_rc_release`] (or [`plan_sync`]
//! followed by [`SyncPlan::execute`]) writes a new candidate and moves its tag.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::bump::BumpInfo;
use crate::github::{GitHubError, Release, ReleaseApi, ReleaseDraft};

static BUMP_INFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BUMP_INFO: (\{[^}]+\})").expect("valid bump info regex"));

/// Tags containing this marker are release candidates.
pub const RC_TAG_MARKER: &str = "-rc.";

/// Version reported when the repository has no releases yet.
pub const INITIAL_VERSION: &str = "0.0.0";

/// Errors from release state handling.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The latest-release payload is not valid JSON.
    #[error("malformed latest release payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// A bump-info record is not valid JSON.
    #[error("malformed bump info: {0}")]
    BumpInfo(#[source] serde_json::Error),

    /// GitHub API error.
    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// The version and bump info of the latest release, as handed between CI steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRelease {
    /// Version string (tag without its prefix). Not validated here.
    pub version: String,
    /// Bump info parsed from the release notes.
    #[serde(rename = "bumpInfo", default)]
    pub bump_info: BumpInfo,
}

impl Default for LatestRelease {
    fn default() -> Self {
        Self {
            version: INITIAL_VERSION.to_string(),
            bump_info: BumpInfo::default(),
        }
    }
}

impl LatestRelease {
    /// Parse a latest-release payload.
    ///
    /// Accepts plain JSON as well as JSON that was string-encoded a second
    /// time on its way through a workflow output (`"{\"version\":…}"`).
    pub fn from_payload(raw: &str) -> ReleaseResult<Self> {
        let unwrapped = unwrap_payload(raw.trim());
        serde_json::from_str(&unwrapped).map_err(ReleaseError::Payload)
    }

    /// Compact JSON payload.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn unwrap_payload(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(raw) {
            return inner;
        }
        return raw[1..raw.len() - 1].replace(r#"\""#, "\"");
    }
    raw.to_string()
}

/// Parse a standalone bump-info record (e.g. from the `bump_info` variable).
pub fn parse_bump_info_json(raw: &str) -> ReleaseResult<BumpInfo> {
    serde_json::from_str(unwrap_payload(raw.trim()).as_str()).map_err(ReleaseError::BumpInfo)
}

/// Find the `BUMP_INFO:` record in release notes.
///
/// Returns `None` when the notes carry no record.
pub fn parse_bump_info(body: &str) -> Option<ReleaseResult<BumpInfo>> {
    let caps = BUMP_INFO_RE.captures(body)?;
    Some(serde_json::from_str(&caps[1]).map_err(ReleaseError::BumpInfo))
}

/// How release tags and titles are formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNaming {
    /// Prefix between the tag and the version (`v`).
    pub tag_prefix: String,
    /// Release title; `{version}` is replaced with the version.
    pub name_template: String,
}

impl Default for ReleaseNaming {
    fn default() -> Self {
        Self {
            tag_prefix: "v".to_string(),
            name_template: "Release Candidate {version}".to_string(),
        }
    }
}

impl ReleaseNaming {
    /// Tag name for `version`.
    pub fn tag(&self, version: &Version) -> String {
        format!("{}{version}", self.tag_prefix)
    }

    /// Release title for `version`.
    pub fn title(&self, version: &Version) -> String {
        self.name_template.replace("{version}", &version.to_string())
    }

    /// The version part of a tag name.
    pub fn version_of<'a>(&self, tag: &'a str) -> &'a str {
        tag.strip_prefix(self.tag_prefix.as_str()).unwrap_or(tag)
    }
}

/// Read the version and bump info of the newest release.
///
/// A repository without releases starts at `0.0.0` with no levels bumped.
/// Notes without a usable `BUMP_INFO:` record also yield an empty record.
#[instrument(skip_all)]
pub fn latest_release(api: &dyn ReleaseApi, naming: &ReleaseNaming) -> ReleaseResult<LatestRelease> {
    let releases = api.list_releases()?;
    let Some(newest) = releases.first() else {
        info!("no releases found, starting from {INITIAL_VERSION}");
        return Ok(LatestRelease::default());
    };

    let version = naming.version_of(&newest.tag_name).to_string();
    let body = newest.body.as_deref().unwrap_or_default();
    let bump_info = match parse_bump_info(body) {
        Some(Ok(info)) => info,
        Some(Err(err)) => {
            warn!(tag = %newest.tag_name, error = %err, "ignoring unreadable BUMP_INFO");
            BumpInfo::default()
        }
        None => {
            debug!(tag = %newest.tag_name, "release notes carry no BUMP_INFO");
            BumpInfo::default()
        }
    };

    info!(tag = %newest.tag_name, %version, "latest release");
    Ok(LatestRelease { version, bump_info })
}

/// Release notes for a candidate, ending with the `BUMP_INFO:` record.
pub fn render_body(version: &Version, sha: &str, bump_info: &BumpInfo) -> String {
    format!(
        "This is the latest release candidate.\n\nVersion: {version}\nCommit: {sha}\nBUMP_INFO: {}",
        bump_info.to_json()
    )
}

/// What the synchronizer will do (or did) with the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ReleaseAction {
    /// A new prerelease is created.
    Create,
    /// An existing candidate release is rewritten in place.
    Update {
        /// Release id.
        id: u64,
        /// Its tag before the update.
        previous_tag: String,
    },
}

impl ReleaseAction {
    /// Short name used in CI outputs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update { .. } => "updated",
        }
    }

    /// Imperative form, for describing a planned action.
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update { .. } => "update",
        }
    }
}

/// How the tag ref ended up pointing at the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagRefAction {
    /// The ref did not exist and was created.
    Created,
    /// The ref existed and was force-moved.
    ForceUpdated,
}

impl TagRefAction {
    /// Short description for progress output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "tag created",
            Self::ForceUpdated => "tag moved",
        }
    }
}

/// A candidate to publish.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// The new candidate version.
    pub version: Version,
    /// Commit the tag should point at.
    pub sha: String,
    /// Bump info to persist in the notes.
    pub bump_info: BumpInfo,
}

/// A fully resolved synchronization, ready to execute.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPlan {
    /// Create or update.
    pub action: ReleaseAction,
    /// Tag name for the new version.
    pub tag: String,
    /// Commit the tag should point at.
    pub sha: String,
    /// Release fields to write.
    #[serde(skip)]
    pub draft: ReleaseDraft,
}

/// Result of an executed synchronization.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// What happened to the release.
    pub action: ReleaseAction,
    /// The release as returned by the API.
    pub release: Release,
    /// Tag name.
    pub tag: String,
    /// What happened to the tag ref.
    pub tag_ref: TagRefAction,
}

/// Decide whether to create a candidate release or update the existing one.
#[instrument(skip_all, fields(version = %request.version))]
pub fn plan_sync(
    api: &dyn ReleaseApi,
    naming: &ReleaseNaming,
    request: &SyncRequest,
) -> ReleaseResult<SyncPlan> {
    let releases = api.list_releases()?;
    let action = match releases
        .iter()
        .find(|r| r.tag_name.contains(RC_TAG_MARKER))
    {
        Some(existing) => ReleaseAction::Update {
            id: existing.id,
            previous_tag: existing.tag_name.clone(),
        },
        None => ReleaseAction::Create,
    };

    let tag = naming.tag(&request.version);
    let draft = ReleaseDraft {
        tag_name: tag.clone(),
        name: naming.title(&request.version),
        body: render_body(&request.version, &request.sha, &request.bump_info),
        prerelease: true,
    };

    debug!(?action, %tag, "planned release sync");
    Ok(SyncPlan {
        action,
        tag,
        sha: request.sha.clone(),
        draft,
    })
}

impl SyncPlan {
    /// Write the release, then point its tag at the commit.
    ///
    /// An existing tag ref (HTTP 422 on create) is force-updated; any other
    /// failure aborts.
    #[instrument(skip_all, fields(tag = %self.tag))]
    pub fn execute(self, api: &dyn ReleaseApi) -> ReleaseResult<SyncOutcome> {
        let release = match &self.action {
            ReleaseAction::Update { id, previous_tag } => {
                info!(%previous_tag, "updating existing release candidate");
                api.update_release(*id, &self.draft)?
            }
            ReleaseAction::Create => {
                info!("creating release candidate");
                api.create_release(&self.draft)?
            }
        };

        let tag_ref = match api.create_tag_ref(&self.tag, &self.sha) {
            Ok(()) => TagRefAction::Created,
            Err(err) if err.is_unprocessable() => {
                debug!(error = %err, "tag ref exists, forcing update");
                api.update_tag_ref(&self.tag, &self.sha)?;
                TagRefAction::ForceUpdated
            }
            Err(err) => return Err(err.into()),
        };

        info!(?tag_ref, "release candidate synced");
        Ok(SyncOutcome {
            action: self.action,
            release,
            tag: self.tag,
            tag_ref,
        })
    }
}

/// Plan and execute a release-candidate sync in one step.
pub fn sync_rc_release(
    api: &dyn ReleaseApi,
    naming: &ReleaseNaming,
    request: &SyncRequest,
) -> ReleaseResult<SyncOutcome> {
    plan_sync(api, naming, request)?.execute(api)
}


#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeApi};
    use super::*;

    fn release(id: u64, tag: &str, body: Option<&str>) -> Release {
        Release {
            id,
            tag_name: tag.to_string(),
            name: None,
            body: body.map(str::to_string),
            prerelease: tag.contains(RC_TAG_MARKER),
        }
    }

    fn request(version: &str) -> SyncRequest {
        SyncRequest {
            version: crate::version::parse_version(version).unwrap(),
            sha: "abc123".into(),
            bump_info: BumpInfo::new(false, true, true),
        }
    }

    #[test]
    fn payload_plain_json() {
        let latest = LatestRelease::from_payload(
            r#"{"version":"1.2.3","bumpInfo":{"major":false,"minor":true,"patch":false}}"#,
        )
        .unwrap();
        assert_eq!(latest.version, "1.2.3");
        assert_eq!(latest.bump_info, BumpInfo::new(false, true, false));
    }

    #[test]
    fn payload_double_encoded() {
        let raw = r#""{\"version\":\"1.2.3-rc.1\",\"bumpInfo\":{\"major\":false,\"minor\":false,\"patch\":true}}""#;
        let latest = LatestRelease::from_payload(raw).unwrap();
        assert_eq!(latest.version, "1.2.3-rc.1");
        assert!(latest.bump_info.patch);
    }

    #[test]
    fn payload_without_bump_info_defaults() {
        let latest = LatestRelease::from_payload(r#"{"version":"2.0.0"}"#).unwrap();
        assert_eq!(latest.bump_info, BumpInfo::default());
    }

    #[test]
    fn payload_malformed() {
        assert!(matches!(
            LatestRelease::from_payload("{not json"),
            Err(ReleaseError::Payload(_))
        ));
    }

    #[test]
    fn payload_round_trips() {
        let latest = LatestRelease::default();
        assert_eq!(
            latest.to_payload(),
            r#"{"version":"0.0.0","bumpInfo":{"major":false,"minor":false,"patch":false}}"#
        );
    }

    #[test]
    fn bump_info_found_in_notes() {
        let body = "Some notes\nBUMP_INFO: {\"major\":false,\"minor\":true,\"patch\":true}\n";
        let info = parse_bump_info(body).unwrap().unwrap();
        assert_eq!(info, BumpInfo::new(false, true, true));
    }

    #[test]
    fn bump_info_absent_from_notes() {
        assert!(parse_bump_info("plain notes").is_none());
    }

    #[test]
    fn rendered_body_is_readable_back() {
        let version = crate::version::parse_version("1.3.0-rc.2").unwrap();
        let info = BumpInfo::new(false, true, true);
        let body = render_body(&version, "deadbeef", &info);
        assert!(body.contains("Version: 1.3.0-rc.2"));
        assert!(body.contains("Commit: deadbeef"));
        assert_eq!(parse_bump_info(&body).unwrap().unwrap(), info);
    }

    #[test]
    fn naming_defaults() {
        let naming = ReleaseNaming::default();
        let v = crate::version::parse_version("1.0.0-rc.1").unwrap();
        assert_eq!(naming.tag(&v), "v1.0.0-rc.1");
        assert_eq!(naming.title(&v), "Release Candidate 1.0.0-rc.1");
        assert_eq!(naming.version_of("v1.0.0-rc.1"), "1.0.0-rc.1");
        assert_eq!(naming.version_of("1.0.0"), "1.0.0");
    }

    #[test]
    fn latest_without_releases_is_initial() {
        let api = FakeApi::default();
        let latest = latest_release(&api, &ReleaseNaming::default()).unwrap();
        assert_eq!(latest, LatestRelease::default());
    }

    #[test]
    fn latest_reads_newest_release() {
        let api = FakeApi::with_releases(vec![
            release(
                2,
                "v1.3.0-rc.1",
                Some("x\nBUMP_INFO: {\"major\":false,\"minor\":true,\"patch\":true}"),
            ),
            release(1, "v1.2.3", Some("stable")),
        ]);
        let latest = latest_release(&api, &ReleaseNaming::default()).unwrap();
        assert_eq!(latest.version, "1.3.0-rc.1");
        assert_eq!(latest.bump_info, BumpInfo::new(false, true, true));
    }

    #[test]
    fn latest_with_unreadable_bump_info_defaults() {
        let api = FakeApi::with_releases(vec![release(
            1,
            "v1.2.3",
            Some("BUMP_INFO: {major: yes}"),
        )]);
        let latest = latest_release(&api, &ReleaseNaming::default()).unwrap();
        assert_eq!(latest.version, "1.2.3");
        assert_eq!(latest.bump_info, BumpInfo::default());
    }

    #[test]
    fn latest_with_null_body() {
        let api = FakeApi::with_releases(vec![release(1, "v0.4.0", None)]);
        let latest = latest_release(&api, &ReleaseNaming::default()).unwrap();
        assert_eq!(latest.version, "0.4.0");
    }

    #[test]
    fn sync_creates_when_no_candidate_exists() {
        let api = FakeApi::with_releases(vec![release(1, "v1.2.3", None)]);
        let plan = plan_sync(&api, &ReleaseNaming::default(), &request("1.3.0-rc.1")).unwrap();
        assert_eq!(plan.action, ReleaseAction::Create);

        let outcome = plan.execute(&api).unwrap();
        assert_eq!(outcome.tag, "v1.3.0-rc.1");
        assert_eq!(outcome.tag_ref, TagRefAction::Created);
        assert!(outcome.release.prerelease);

        let calls = api.calls();
        assert!(matches!(&calls[1], Call::Create(d) if d.name == "Release Candidate 1.3.0-rc.1"));
        assert_eq!(
            calls[2],
            Call::CreateRef("v1.3.0-rc.1".into(), "abc123".into())
        );
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn sync_updates_existing_candidate_in_place() {
        let api = FakeApi::with_releases(vec![
            release(9, "v1.3.0-rc.1", None),
            release(1, "v1.2.3", None),
        ]);
        let plan = plan_sync(&api, &ReleaseNaming::default(), &request("1.3.0-rc.2")).unwrap();
        assert_eq!(
            plan.action,
            ReleaseAction::Update {
                id: 9,
                previous_tag: "v1.3.0-rc.1".into()
            }
        );

        let outcome = plan.execute(&api).unwrap();
        assert_eq!(outcome.action.as_str(), "updated");
        assert!(matches!(&api.calls()[1], Call::Update(9, d) if d.tag_name == "v1.3.0-rc.2"));
    }

    #[test]
    fn sync_body_carries_bump_info() {
        let api = FakeApi::default();
        let plan = plan_sync(&api, &ReleaseNaming::default(), &request("1.3.0-rc.1")).unwrap();
        let info = parse_bump_info(&plan.draft.body).unwrap().unwrap();
        assert_eq!(info, BumpInfo::new(false, true, true));
        assert!(plan.draft.prerelease);
    }

    #[test]
    fn sync_force_updates_existing_tag() {
        let api = FakeApi {
            existing_refs: vec!["v1.3.0-rc.1".into()],
            ..FakeApi::default()
        };
        let outcome = plan_sync(&api, &ReleaseNaming::default(), &request("1.3.0-rc.1"))
            .unwrap()
            .execute(&api)
            .unwrap();
        assert_eq!(outcome.tag_ref, TagRefAction::ForceUpdated);
        assert_eq!(
            api.calls().last().unwrap(),
            &Call::UpdateRef("v1.3.0-rc.1".into(), "abc123".into())
        );
    }

    #[test]
    fn sync_rc_release_plans_then_executes() {
        let api = FakeApi::default();
        let outcome =
            sync_rc_release(&api, &ReleaseNaming::default(), &request("0.0.1-rc.1")).unwrap();
        assert_eq!(outcome.action, ReleaseAction::Create);
        assert_eq!(outcome.tag, "v0.0.1-rc.1");
        assert_eq!(api.calls().len(), 3);
    }

    #[test]
    fn sync_aborts_on_other_ref_errors() {
        let api = FakeApi {
            fail_refs_with: Some(403),
            ..FakeApi::default()
        };
        let err = plan_sync(&api, &ReleaseNaming::default(), &request("1.3.0-rc.1"))
            .unwrap()
            .execute(&api)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::GitHub(ref e) if e.status() == Some(403)));
        assert!(
            !api.calls()
                .iter()
                .any(|c| matches!(c, Call::UpdateRef(..)))
        );
    }
}
