//! Version parsing and release-candidate computation.
//!
//! Versions handled here are strictly `major.minor.patch` with an optional
//! `-rc.N` suffix. Anything else (build metadata, other pre-release labels,
//! a leading `v`) is rejected so that a malformed release tag never turns
//! into a silently wrong bump.

pub mod conventional;

use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::bump::BumpInfo;

/// The only version shape accepted for release candidates.
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)(-rc\.([0-9]+))?$").expect("valid version regex")
});

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The version string does not match `major.minor.patch[-rc.N]`.
    #[error("invalid version format: {0:?} (expected major.minor.patch[-rc.N])")]
    InvalidFormat(String),

    /// A numeric component does not fit in 64 bits, or would not after
    /// the bump.
    #[error("version component out of range in {0:?}")]
    OutOfRange(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpLevel {
    /// Returns the level as a lowercase string slice.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl std::fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a `major.minor.patch[-rc.N]` version string.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let caps = VERSION_RE
        .captures(s)
        .ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?;

    let component = |i: usize| -> VersionResult<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|_| VersionError::OutOfRange(s.to_string()))
    };

    let mut version = Version::new(component(1)?, component(2)?, component(3)?);
    if caps.get(5).is_some() {
        version.pre = rc_prerelease(component(5)?);
    }
    Ok(version)
}

/// The release-candidate number of `version`, if it carries an `rc.N` suffix.
pub fn rc_number(version: &Version) -> Option<u64> {
    version
        .pre
        .as_str()
        .strip_prefix("rc.")
        .and_then(|n| n.parse().ok())
}

/// Compute the next release-candidate version.
///
/// `bump_info` is the record *before* this bump is merged in:
/// a level that was already touched only advances the rc counter.
///
/// Fails with [`VersionError::OutOfRange`] when the incremented component
/// would not fit in 64 bits.
#[instrument(fields(current = %current))]
pub fn next_rc_version(
    current: &Version,
    level: BumpLevel,
    bump_info: &BumpInfo,
) -> VersionResult<Version> {
    let bumped = |n: u64| {
        n.checked_add(1)
            .ok_or_else(|| VersionError::OutOfRange(current.to_string()))
    };

    let next = match level {
        BumpLevel::Major => rc(bumped(current.major)?, 0, 0, 1),
        BumpLevel::Minor if !bump_info.minor => rc(current.major, bumped(current.minor)?, 0, 1),
        BumpLevel::Patch if !bump_info.patch => {
            rc(current.major, current.minor, bumped(current.patch)?, 1)
        }
        BumpLevel::Minor | BumpLevel::Patch => {
            let n = match rc_number(current) {
                Some(n) => bumped(n)?,
                None => 1,
            };
            rc(current.major, current.minor, current.patch, n)
        }
    };
    debug!(%level, %next, "computed next version");
    Ok(next)
}

fn rc(major: u64, minor: u64, patch: u64, n: u64) -> Version {
    let mut version = Version::new(major, minor, patch);
    version.pre = rc_prerelease(n);
    version
}

fn rc_prerelease(n: u64) -> Prerelease {
    Prerelease::new(&format!("rc.{n}")).unwrap_or(Prerelease::EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(major: bool, minor: bool, patch: bool) -> BumpInfo {
        BumpInfo::new(major, minor, patch)
    }

    #[test]
    fn parse_plain() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_rc() {
        let v = parse_version("1.2.3-rc.4").unwrap();
        assert_eq!(v.to_string(), "1.2.3-rc.4");
        assert_eq!(rc_number(&v), Some(4));
    }

    #[test]
    fn parse_rejects_prefix_and_short_forms() {
        for bad in ["v1.2", "v1.2.3", "1.2", "1.2.3-beta.1", "1.2.3-rc.", "1.2.3+build", ""] {
            assert!(
                matches!(parse_version(bad), Err(VersionError::InvalidFormat(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            parse_version("99999999999999999999.0.0"),
            Err(VersionError::OutOfRange(_))
        ));
    }

    #[test]
    fn plain_version_has_no_rc_number() {
        assert_eq!(rc_number(&Version::new(1, 0, 0)), None);
    }

    #[test]
    fn major_always_starts_fresh_rc() {
        let v = parse_version("1.2.3-rc.7").unwrap();
        let next = next_rc_version(&v, BumpLevel::Major, &info(true, true, true)).unwrap();
        assert_eq!(next.to_string(), "2.0.0-rc.1");
    }

    #[test]
    fn minor_when_untouched() {
        let v = parse_version("1.2.3").unwrap();
        let next = next_rc_version(&v, BumpLevel::Minor, &info(false, false, false)).unwrap();
        assert_eq!(next.to_string(), "1.3.0-rc.1");
    }

    #[test]
    fn minor_when_touched_increments_rc() {
        let v = parse_version("1.3.0-rc.1").unwrap();
        let next = next_rc_version(&v, BumpLevel::Minor, &info(false, true, true)).unwrap();
        assert_eq!(next.to_string(), "1.3.0-rc.2");
    }

    #[test]
    fn minor_when_touched_without_rc_starts_at_one() {
        let v = parse_version("1.3.0").unwrap();
        let next = next_rc_version(&v, BumpLevel::Minor, &info(false, true, true)).unwrap();
        assert_eq!(next.to_string(), "1.3.0-rc.1");
    }

    #[test]
    fn patch_when_untouched() {
        let v = parse_version("1.2.3").unwrap();
        let next = next_rc_version(&v, BumpLevel::Patch, &info(false, false, false)).unwrap();
        assert_eq!(next.to_string(), "1.2.4-rc.1");
    }

    #[test]
    fn patch_when_touched_increments_rc() {
        let v = parse_version("1.2.3-rc.2").unwrap();
        let next = next_rc_version(&v, BumpLevel::Patch, &info(false, false, true)).unwrap();
        assert_eq!(next.to_string(), "1.2.3-rc.3");
    }

    #[test]
    fn patch_after_minor_stays_on_same_base() {
        // A minor bump set both minor and patch, so a following fix only
        // advances the candidate number.
        let v = parse_version("1.3.0-rc.1").unwrap();
        let next = next_rc_version(&v, BumpLevel::Patch, &info(false, true, true)).unwrap();
        assert_eq!(next.to_string(), "1.3.0-rc.2");
    }

    #[test]
    fn major_at_u64_max_is_out_of_range() {
        let v = parse_version("18446744073709551615.0.0").unwrap();
        let err = next_rc_version(&v, BumpLevel::Major, &info(false, false, false)).unwrap_err();
        assert!(matches!(err, VersionError::OutOfRange(ref s) if s == "18446744073709551615.0.0"));
    }

    #[test]
    fn minor_and_patch_at_u64_max_are_out_of_range() {
        let v = parse_version("1.18446744073709551615.18446744073709551615").unwrap();
        for level in [BumpLevel::Minor, BumpLevel::Patch] {
            assert!(matches!(
                next_rc_version(&v, level, &info(false, false, false)),
                Err(VersionError::OutOfRange(_))
            ));
        }
    }

    #[test]
    fn rc_number_at_u64_max_is_out_of_range() {
        let v = parse_version("1.2.3-rc.18446744073709551615").unwrap();
        assert!(matches!(
            next_rc_version(&v, BumpLevel::Patch, &info(false, false, true)),
            Err(VersionError::OutOfRange(_))
        ));
    }

    #[test]
    fn bump_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BumpLevel::Minor).unwrap(), "\"minor\"");
    }
}
