//! Info command: show package and configuration information.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use camino::Utf8Path;
use rcbump_core::config::Config;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    commit_count: usize,
    subject_match: String,
    tag_prefix: String,
    release_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, config_file: Option<&Utf8Path>, cwd: &Utf8Path) -> Self {
        let naming = config.release.naming();
        Self {
            config_file: super::effective_config_file(config_file, cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            commit_count: config.commits.count,
            subject_match: config.commits.subject_match.to_string(),
            tag_prefix: naming.tag_prefix,
            release_name: naming.name_template,
            repository: config.github.repository.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package information.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `config_file` - Explicit `--config` file, if any
/// * `cwd` - Current working directory for config discovery
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    config_file: Option<&Utf8Path>,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let full_info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, config_file, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&full_info)?);
        return Ok(());
    }

    let package = &full_info.package;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }

    let cfg = &full_info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match cfg.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "Release Candidates".bold().underline());
    println!(
        "{}: {} ({})",
        "Commits inspected".dimmed(),
        cfg.commit_count,
        cfg.subject_match
    );
    println!("{}: {}", "Tag prefix".dimmed(), cfg.tag_prefix.cyan());
    println!("{}: {}", "Release name".dimmed(), cfg.release_name.cyan());
    match cfg.repository {
        Some(ref repo) => println!("{}: {}", "Repository".dimmed(), repo.cyan()),
        None => println!(
            "{}: {}",
            "Repository".dimmed(),
            "from GITHUB_REPOSITORY or origin".dimmed()
        ),
    }

    Ok(())
}
