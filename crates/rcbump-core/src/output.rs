//! CI step outputs and failure annotations (GitHub Actions conventions).
//!
//! Outputs are `key=value` lines appended to the file named by
//! `$GITHUB_OUTPUT`. Values spanning several lines use the heredoc form:
//!
//! ```text
//! key<<RCBUMP_EOF
//! first line
//! second line
//! RCBUMP_EOF
//! ```

use std::fs::OpenOptions;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

/// Environment variable naming the step output file.
pub const ENV_GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";

/// Environment variable set to `true` inside GitHub Actions.
pub const ENV_GITHUB_ACTIONS: &str = "GITHUB_ACTIONS";

const HEREDOC_DELIMITER: &str = "RCBUMP_EOF";

/// Errors from writing outputs.
#[derive(Error, Debug)]
pub enum OutputError {
    /// The output file could not be written.
    #[error("failed to write outputs to {path}: {source}")]
    Io {
        /// The output file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Named step outputs, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    entries: Vec<(String, String)>,
}

impl Outputs {
    /// Empty output set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing an earlier value for the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Set every entry of `other`, in order.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        for (key, value) in &other.entries {
            self.set(key.as_str(), value.as_str());
        }
        self
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Outputs in the `$GITHUB_OUTPUT` line format.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format_entry(k, v))
            .collect()
    }

    /// Outputs as a JSON object of strings.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// Append the outputs to `path`.
    #[instrument(skip(self), fields(count = self.entries.len()))]
    pub fn append_to_file(&self, path: &Utf8Path) -> OutputResult<()> {
        let io_err = |source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(self.render().as_bytes()).map_err(io_err)?;
        debug!("outputs written");
        Ok(())
    }
}

/// The output file from `$GITHUB_OUTPUT`, if set and non-empty.
pub fn github_output_path() -> Option<Utf8PathBuf> {
    std::env::var(ENV_GITHUB_OUTPUT)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(Utf8PathBuf::from)
}

/// Whether we are running inside GitHub Actions.
pub fn is_github_actions() -> bool {
    std::env::var(ENV_GITHUB_ACTIONS).is_ok_and(|v| v == "true")
}

/// An `::error::` workflow command marking the step as failed.
pub fn failure_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{escaped}")
}

fn format_entry(key: &str, value: &str) -> String {
    if !value.contains('\n') && !value.contains('\r') {
        return format!("{key}={value}\n");
    }

    let mut delimiter = HEREDOC_DELIMITER.to_string();
    while value.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn single_line_values() {
        let mut outputs = Outputs::new();
        outputs.set("new_version", "1.3.0-rc.1").set("bump_type", "minor");
        assert_eq!(outputs.render(), "new_version=1.3.0-rc.1\nbump_type=minor\n");
    }

    #[test]
    fn set_replaces_existing_key() {
        let mut outputs = Outputs::new();
        outputs.set("a", "1").set("a", "2");
        assert_eq!(outputs.get("a"), Some("2"));
        assert_eq!(outputs.render(), "a=2\n");
    }

    #[test]
    fn merge_keeps_order_and_overrides() {
        let mut outputs = Outputs::new();
        outputs.set("a", "1").set("b", "2");
        let mut other = Outputs::new();
        other.set("b", "3").set("c", "4");
        outputs.merge(&other);
        assert_eq!(outputs.render(), "a=1\nb=3\nc=4\n");
    }

    #[test]
    fn multi_line_values_use_heredoc() {
        let mut outputs = Outputs::new();
        outputs.set("notes", "one\ntwo");
        assert_eq!(outputs.render(), "notes<<RCBUMP_EOF\none\ntwo\nRCBUMP_EOF\n");
    }

    #[test]
    fn heredoc_delimiter_avoids_collisions() {
        let rendered = format_entry("notes", "x\nRCBUMP_EOF\ny");
        assert!(rendered.starts_with("notes<<RCBUMP_EOF_\n"));
        assert!(rendered.ends_with("\nRCBUMP_EOF_\n"));
    }

    #[test]
    fn json_form_keeps_strings() {
        let mut outputs = Outputs::new();
        outputs.set("bump_info", r#"{"major":false}"#);
        assert_eq!(outputs.to_json()["bump_info"], r#"{"major":false}"#);
    }

    #[test]
    fn append_to_file_appends() {
        let tmp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("out")).unwrap();
        std::fs::write(&path, "existing=1\n").unwrap();

        let mut outputs = Outputs::new();
        outputs.set("tag", "v1.0.0-rc.1");
        outputs.append_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "existing=1\ntag=v1.0.0-rc.1\n");
    }

    #[test]
    fn append_to_missing_dir_fails() {
        let outputs = Outputs::new();
        let err = outputs
            .append_to_file(Utf8Path::new("/nonexistent/dir/out"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/out"));
    }

    #[test]
    fn annotation_escapes_newlines() {
        assert_eq!(
            failure_annotation("bad\nthing 100%"),
            "::error::bad%0Athing 100%25"
        );
    }
}
