//! Conventional-commit classification.
//!
//! Decides which [`BumpLevel`] a batch of recent commits calls for:
//!
//! - **major**: any `BREAKING CHANGE:` footer, or a subject with `!`
//!   before its first colon (`feat(api)!: drop v1 routes`)
//! - **minor**: any subject of the form `feat: …` / `feat(scope): …`
//! - **patch**: everything else

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::version::BumpLevel;

static BREAKING_FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^BREAKING CHANGE:").expect("valid breaking regex"));

static BREAKING_SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:]+!").expect("valid bang regex"));

static FEAT_SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^feat(\(.+\))?:").expect("valid feat regex"));

/// Separator placed after each record by [`LOG_FORMAT`].
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// `git log --format` producing `subject\nbody<RS>` per commit.
pub const LOG_FORMAT: &str = "%s%n%b%x1e";

/// Which subject lines the `feat` and `!` patterns are tested against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubjectMatch {
    /// Test the subject of every commit.
    #[default]
    Each,
    /// Test only the first line of the whole log (newest commit's subject).
    First,
}

impl std::fmt::Display for SubjectMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Each => f.write_str("each"),
            Self::First => f.write_str("first"),
        }
    }
}

/// A single commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// First line of the message.
    pub subject: String,
    /// Everything after the subject, trimmed.
    pub body: String,
}

impl Commit {
    /// Split a raw commit message into subject and body.
    pub fn from_message(message: &str) -> Self {
        let message = message.trim_start_matches(['\n', '\r']);
        let (subject, body) = message.split_once('\n').unwrap_or((message, ""));
        Self {
            subject: subject.trim_end().to_string(),
            body: body.trim().to_string(),
        }
    }

    /// Subject and body joined by a newline.
    pub fn text(&self) -> String {
        if self.body.is_empty() {
            self.subject.clone()
        } else {
            format!("{}\n{}", self.subject, self.body)
        }
    }

    fn has_breaking_footer(&self) -> bool {
        BREAKING_FOOTER_RE.is_match(&self.text())
    }

    fn has_breaking_marker(&self) -> bool {
        BREAKING_SUBJECT_RE.is_match(&self.subject)
    }

    fn is_feature(&self) -> bool {
        FEAT_SUBJECT_RE.is_match(&self.subject)
    }
}

/// Parse `git log --format=`[`LOG_FORMAT`] output into commits, newest first.
pub fn parse_log(raw: &str) -> Vec<Commit> {
    raw.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(Commit::from_message)
        .collect()
}

/// Classify a batch of commits into the bump level they require.
#[instrument(skip_all, fields(count = commits.len(), %mode))]
pub fn classify(commits: &[Commit], mode: SubjectMatch) -> BumpLevel {
    let subjects: Vec<&Commit> = match mode {
        SubjectMatch::Each => commits.iter().collect(),
        SubjectMatch::First => commits.first().into_iter().collect(),
    };

    if let Some(c) = commits.iter().find(|c| c.has_breaking_footer()) {
        debug!(subject = %c.subject, "breaking change footer");
        return BumpLevel::Major;
    }
    if let Some(c) = subjects.iter().find(|c| c.has_breaking_marker()) {
        debug!(subject = %c.subject, "breaking change marker");
        return BumpLevel::Major;
    }
    if let Some(c) = subjects.iter().find(|c| c.is_feature()) {
        debug!(subject = %c.subject, "feature commit");
        return BumpLevel::Minor;
    }

    debug!("no breaking or feature commits");
    BumpLevel::Patch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commits(messages: &[&str]) -> Vec<Commit> {
        messages.iter().map(|m| Commit::from_message(m)).collect()
    }

    #[test]
    fn breaking_footer_wins_over_everything() {
        let c = commits(&[
            "feat: add thing",
            "fix: tidy\n\nBREAKING CHANGE: config keys renamed",
            "chore: deps",
        ]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Major);
        assert_eq!(classify(&c, SubjectMatch::First), BumpLevel::Major);
    }

    #[test]
    fn breaking_footer_must_start_a_line() {
        let c = commits(&["fix: mention the BREAKING CHANGE: text inline"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Patch);
    }

    #[test]
    fn bang_marker_is_major() {
        let c = commits(&["feat(api)!: remove v1 endpoints"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Major);
    }

    #[test]
    fn bang_after_colon_is_not_breaking() {
        let c = commits(&["fix: handle errors!"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Patch);
    }

    #[test]
    fn feat_is_minor() {
        let c = commits(&["feat: x"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Minor);
    }

    #[test]
    fn scoped_feat_is_minor() {
        let c = commits(&["fix: y", "feat(cli): add --json"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Minor);
    }

    #[test]
    fn feature_is_not_feat() {
        let c = commits(&["feature: nope", "feats: nope"]);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Patch);
    }

    #[test]
    fn first_mode_only_reads_newest_subject() {
        let c = commits(&["fix: y", "feat: x"]);
        assert_eq!(classify(&c, SubjectMatch::First), BumpLevel::Patch);
        assert_eq!(classify(&c, SubjectMatch::Each), BumpLevel::Minor);
    }

    #[test]
    fn empty_batch_is_patch() {
        assert_eq!(classify(&[], SubjectMatch::Each), BumpLevel::Patch);
    }

    #[test]
    fn parse_log_splits_records() {
        let raw = "feat: a\nbody line\n\x1e\nfix: b\n\n\x1e\n";
        let parsed = parse_log(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].subject, "feat: a");
        assert_eq!(parsed[0].body, "body line");
        assert_eq!(parsed[1].subject, "fix: b");
        assert!(parsed[1].body.is_empty());
    }

    #[test]
    fn footer_in_parsed_log_is_found() {
        let raw = "refactor: x\n\nBREAKING CHANGE: gone\n\x1e\n";
        assert_eq!(classify(&parse_log(raw), SubjectMatch::Each), BumpLevel::Major);
    }
}
