//! Tool detection: which external programs are available, and how new they are.
//!
//! rcbump shells out to `git` for the commit log and to `gh` for the GitHub
//! API. `doctor` uses these probes to explain what is missing.
//!
//! # Example
//!
//! ```no_run
//! use rcbump_core::detect::{self, ToolVersionCheck};
//!
//! match detect::check_tool_version("gh", &detect::MIN_GH_VERSION) {
//!     ToolVersionCheck::Ok(v) => println!("gh {v}"),
//!     other => println!("gh unusable: {other:?}"),
//! }
//! ```

use std::process::Command;

use semver::Version;
use tracing::{debug, instrument};

/// Minimum required version of the GitHub CLI.
///
/// 2.0.0 is the first release with `gh api --method` and `-F` typed fields.
pub const MIN_GH_VERSION: Version = Version::new(2, 0, 0);

/// Minimum required version of git.
///
/// `git log --format` with `%x1e` and `git remote get-url` are both older
/// than this.
pub const MIN_GIT_VERSION: Version = Version::new(2, 7, 0);

/// Check whether a binary is available on `PATH`.
pub fn has_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Result of a tool version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVersionCheck {
    /// Tool meets the minimum version.
    Ok(Version),
    /// Tool is too old.
    TooOld {
        /// The version that was found.
        found: Version,
        /// The minimum required version.
        minimum: Version,
    },
    /// Could not determine the version (binary missing, parse failure, etc.).
    Unknown(String),
}

impl ToolVersionCheck {
    /// Whether the tool is usable.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Check the installed version of a CLI tool.
///
/// Runs `<binary> --version`, parses the first semver-looking token from its
/// output, and compares against `minimum`. Works for `gh version 2.40.1 (…)`
/// and `git version 2.43.0`.
#[instrument]
pub fn check_tool_version(binary: &str, minimum: &Version) -> ToolVersionCheck {
    let output = match Command::new(binary).arg("--version").output() {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            return ToolVersionCheck::Unknown(format!(
                "`{binary} --version` exited with {}",
                o.status,
            ));
        }
        Err(e) => {
            return ToolVersionCheck::Unknown(format!(
                "failed to run `{binary} --version`: {e}",
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(version) = parse_version_from_output(&stdout) else {
        return ToolVersionCheck::Unknown(format!(
            "could not parse version from `{binary} --version` output: {}",
            stdout.trim(),
        ));
    };
    debug!(%binary, %version, "tool version");

    compare(version, minimum)
}

fn compare(version: Version, minimum: &Version) -> ToolVersionCheck {
    if version >= *minimum {
        ToolVersionCheck::Ok(version)
    } else {
        ToolVersionCheck::TooOld {
            found: version,
            minimum: minimum.clone(),
        }
    }
}

/// Extract a semver version from tool output like `"gh version 2.40.1 (2023-12-13)"`.
///
/// Scans for the first token that parses as a valid semver version.
fn parse_version_from_output(output: &str) -> Option<Version> {
    output
        .split_whitespace()
        .find_map(|token| Version::parse(token).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_from_gh_output() {
        let v = parse_version_from_output(
            "gh version 2.40.1 (2023-12-13)\nhttps://github.com/cli/cli/releases/tag/v2.40.1\n",
        );
        assert_eq!(v, Some(Version::new(2, 40, 1)));
    }

    #[test]
    fn parse_version_from_git_output() {
        let v = parse_version_from_output("git version 2.43.0\n");
        assert_eq!(v, Some(Version::new(2, 43, 0)));
    }

    #[test]
    fn parse_version_from_garbage() {
        assert!(parse_version_from_output("not a version").is_none());
        assert!(parse_version_from_output("").is_none());
    }

    #[test]
    fn compare_against_minimum() {
        assert!(compare(Version::new(2, 0, 0), &MIN_GH_VERSION).is_ok());
        assert_eq!(
            compare(Version::new(1, 14, 0), &MIN_GH_VERSION),
            ToolVersionCheck::TooOld {
                found: Version::new(1, 14, 0),
                minimum: MIN_GH_VERSION,
            }
        );
    }

    #[test]
    fn missing_binary_is_unknown() {
        let check = check_tool_version("rcbump-no-such-tool", &MIN_GH_VERSION);
        assert!(matches!(check, ToolVersionCheck::Unknown(_)));
        assert!(!has_binary("rcbump-no-such-tool"));
    }
}
