//! Core library for rcbump.
//!
//! This crate provides the types and operations behind the `rcbump` CLI:
//! classifying commits, computing release-candidate versions, and keeping a
//! GitHub release-candidate release in sync.
//!
//! # Modules
//!
//! - [`bump`] - Bump-info record and bump planning
//! - [`config`] - Configuration loading and management
//! - [`cycle`] - The full latest → classify → next → sync pass
//! - [`detect`] - External tool detection
//! - [`error`] - Configuration error types
//! - [`git`] - Git operations (commit log, HEAD, remotes)
//! - [`github`] - GitHub release and tag-ref API
//! - [`output`] - CI step outputs and failure annotations
//! - [`release`] - Latest-release state and release-candidate sync
//! - [`version`] - Version parsing, commit classification, next-version computation
//!
//! # Quick Start
//!
//! ```
//! use rcbump_core::bump::BumpInfo;
//! use rcbump_core::version::{self, BumpLevel};
//!
//! let current = version::parse_version("1.2.3").unwrap();
//! let next = version::next_rc_version(&current, BumpLevel::Minor, &BumpInfo::default()).unwrap();
//! assert_eq!(next.to_string(), "1.3.0-rc.1");
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod cycle;

pub mod detect;

pub mod error;

pub mod git;

pub mod github;

pub mod output;

pub mod release;

pub mod version;

pub use bump::{BumpInfo, BumpPlan};

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use release::LatestRelease;

pub use version::BumpLevel;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
