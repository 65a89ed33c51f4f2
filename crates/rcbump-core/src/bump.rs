//! Bump-info tracking and bump planning.
//!
//! [`BumpInfo`] records which levels have been bumped since the last stable
//! release. It is the only state carried between CI runs (see
//! [`crate::release`] for how it is persisted). [`plan_bump`] combines the
//! version calculator with the merger into a single [`BumpPlan`].

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::release::LatestRelease;
use crate::version::{self, BumpLevel, VersionResult};

/// Which bump levels have been touched since the last stable release.
///
/// Flags only ever go from `false` to `true`. Keys other than the three
/// flags are carried through untouched so older records survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BumpInfo {
    /// A major bump is pending.
    pub major: bool,
    /// A minor bump is pending.
    pub minor: bool,
    /// A patch bump is pending.
    pub patch: bool,
    /// Unrecognized keys from a persisted record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BumpInfo {
    /// Create a record with the given flags and no extra keys.
    pub fn new(major: bool, minor: bool, patch: bool) -> Self {
        Self {
            major,
            minor,
            patch,
            extra: Map::new(),
        }
    }

    /// OR the flags implied by `level` into this record.
    ///
    /// - major sets all three flags
    /// - minor sets minor and patch
    /// - patch sets patch
    #[must_use]
    pub fn merge(&self, level: BumpLevel) -> Self {
        let mut merged = self.clone();
        match level {
            BumpLevel::Major => {
                merged.major = true;
                merged.minor = true;
                merged.patch = true;
            }
            BumpLevel::Minor => {
                merged.minor = true;
                merged.patch = true;
            }
            BumpLevel::Patch => merged.patch = true,
        }
        merged
    }

    /// Compact JSON form, as embedded in release bodies and CI outputs.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// The outcome of planning a bump from the latest release.
#[derive(Debug, Clone, Serialize)]
pub struct BumpPlan {
    /// Version of the latest release.
    pub previous: Version,
    /// The requested bump level.
    pub level: BumpLevel,
    /// The next release-candidate version.
    pub next: Version,
    /// Bump info after merging `level`.
    pub bump_info: BumpInfo,
}

/// Compute the next version and merged bump info for `level`.
///
/// Fails if the latest release's version is not `major.minor.patch[-rc.N]`.
#[instrument(skip(latest), fields(latest = %latest.version))]
pub fn plan_bump(latest: &LatestRelease, level: BumpLevel) -> VersionResult<BumpPlan> {
    let previous = version::parse_version(&latest.version)?;
    let next = version::next_rc_version(&previous, level, &latest.bump_info)?;
    let bump_info = latest.bump_info.merge(level);

    info!(%previous, %next, %level, "planned bump");
    Ok(BumpPlan {
        previous,
        level,
        next,
        bump_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionError;

    fn latest(version: &str, info: BumpInfo) -> LatestRelease {
        LatestRelease {
            version: version.to_string(),
            bump_info: info,
        }
    }

    #[test]
    fn merge_major_sets_everything() {
        let merged = BumpInfo::default().merge(BumpLevel::Major);
        assert_eq!(merged, BumpInfo::new(true, true, true));
    }

    #[test]
    fn merge_minor_keeps_major() {
        let merged = BumpInfo::new(true, false, false).merge(BumpLevel::Minor);
        assert_eq!(merged, BumpInfo::new(true, true, true));

        let merged = BumpInfo::default().merge(BumpLevel::Minor);
        assert_eq!(merged, BumpInfo::new(false, true, true));
    }

    #[test]
    fn merge_patch_only_sets_patch() {
        let merged = BumpInfo::new(false, true, false).merge(BumpLevel::Patch);
        assert_eq!(merged, BumpInfo::new(false, true, true));
    }

    #[test]
    fn merge_never_clears_flags() {
        let all = BumpInfo::new(true, true, true);
        for level in [BumpLevel::Major, BumpLevel::Minor, BumpLevel::Patch] {
            assert_eq!(all.merge(level), all);
        }
    }

    #[test]
    fn missing_flags_default_to_false() {
        let info: BumpInfo = serde_json::from_str(r#"{"minor":true}"#).unwrap();
        assert_eq!(info, BumpInfo::new(false, true, false));
    }

    #[test]
    fn extra_keys_survive_merge_and_serialization() {
        let info: BumpInfo =
            serde_json::from_str(r#"{"major":false,"minor":false,"patch":true,"note":"x"}"#)
                .unwrap();
        let json = info.merge(BumpLevel::Minor).to_json();
        assert_eq!(json, r#"{"major":false,"minor":true,"patch":true,"note":"x"}"#);
    }

    #[test]
    fn plan_minor_from_stable() {
        let plan = plan_bump(&latest("1.2.3", BumpInfo::default()), BumpLevel::Minor).unwrap();
        assert_eq!(plan.next.to_string(), "1.3.0-rc.1");
        assert_eq!(plan.bump_info, BumpInfo::new(false, true, true));
    }

    #[test]
    fn plan_patch_on_existing_candidate() {
        let plan = plan_bump(
            &latest("1.2.3-rc.2", BumpInfo::new(false, false, true)),
            BumpLevel::Patch,
        )
        .unwrap();
        assert_eq!(plan.next.to_string(), "1.2.3-rc.3");
    }

    #[test]
    fn plan_major() {
        let plan = plan_bump(&latest("1.2.3", BumpInfo::default()), BumpLevel::Major).unwrap();
        assert_eq!(plan.next.to_string(), "2.0.0-rc.1");
        assert_eq!(plan.bump_info, BumpInfo::new(true, true, true));
    }

    #[test]
    fn plan_rejects_bad_version() {
        let err = plan_bump(&latest("v1.2", BumpInfo::default()), BumpLevel::Patch).unwrap_err();
        assert!(matches!(err, VersionError::InvalidFormat(ref s) if s == "v1.2"));
    }

    #[test]
    fn plan_rejects_overflowing_bump() {
        let err = plan_bump(
            &latest("18446744073709551615.0.0", BumpInfo::default()),
            BumpLevel::Major,
        )
        .unwrap_err();
        assert!(matches!(err, VersionError::OutOfRange(_)));
    }
}
