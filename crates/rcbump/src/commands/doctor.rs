//! Doctor command: diagnose configuration and environment.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use rcbump_core::config;
use rcbump_core::detect::{self, ToolVersionCheck};
use rcbump_core::git;
use rcbump_core::semver::Version;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    tools: Vec<ToolStatus>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to loaded config file, if any
    file: Option<String>,
    /// Whether a config file was found
    found: bool,
}

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    on_path: bool,
    version: Option<String>,
    minimum: String,
    /// Why the tool is unusable, if it is
    problem: Option<String>,
}

impl ToolStatus {
    fn probe(name: &'static str, minimum: &Version) -> Self {
        let on_path = detect::has_binary(name);
        let (version, problem) = if on_path {
            match detect::check_tool_version(name, minimum) {
                ToolVersionCheck::Ok(v) => (Some(v.to_string()), None),
                ToolVersionCheck::TooOld { found, minimum } => (
                    Some(found.to_string()),
                    Some(format!("older than the required {minimum}")),
                ),
                ToolVersionCheck::Unknown(reason) => (None, Some(reason)),
            }
        } else {
            (None, Some("not found on PATH".to_string()))
        };

        Self {
            name,
            on_path,
            version,
            minimum: minimum.to_string(),
            problem,
        }
    }

    const fn is_ok(&self) -> bool {
        self.problem.is_none()
    }
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: Option<String>,
    /// Whether the working directory is inside a git checkout
    git_repository: bool,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

/// Variables whose values are never echoed.
const SECRET_VARS: &[&str] = &["GH_TOKEN", "GITHUB_TOKEN"];

const ENV_VARS: &[(&str, &str)] = &[
    ("GITHUB_ACTIONS", "Running inside GitHub Actions"),
    ("GITHUB_REPOSITORY", "Repository for release calls"),
    ("GITHUB_SHA", "Commit to tag"),
    ("GITHUB_OUTPUT", "Step output file"),
    ("GH_TOKEN", "Token used by gh"),
    ("GITHUB_TOKEN", "Fallback token used by gh"),
    ("XDG_CONFIG_HOME", "Override config directory"),
    ("RUST_LOG", "Log filter directive"),
    ("RCBUMP_LOG_PATH", "Explicit log file path"),
    ("RCBUMP_LOG_DIR", "Log directory"),
];

impl DoctorReport {
    fn gather(config_file: Option<&camino::Utf8Path>, cwd: &camino::Utf8Path) -> Self {
        let config_file = super::effective_config_file(config_file, cwd);

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            tools: vec![
                ToolStatus::probe("git", &detect::MIN_GIT_VERSION),
                ToolStatus::probe("gh", &detect::MIN_GH_VERSION),
            ],
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                git_repository: git::is_inside_repo().unwrap_or(false),
                env_vars: ENV_VARS
                    .iter()
                    .map(|&(name, description)| EnvVar {
                        name,
                        value: std::env::var(name).ok().map(|value| {
                            if SECRET_VARS.contains(&name) {
                                "(set)".to_string()
                            } else {
                                value
                            }
                        }),
                        description,
                    })
                    .collect(),
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config_file` - Explicit `--config` file, if any
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config_file: Option<&camino::Utf8Path>,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config_file, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if report.config.found {
        println!(
            "  {} Config file: {}",
            "✓".green(),
            report.config.file.as_deref().unwrap_or("").cyan()
        );
    } else {
        println!("  {} No config file found (defaults apply)", "○".yellow());
    }
    println!();

    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        let version = tool.version.as_deref().unwrap_or("?");
        if tool.is_ok() {
            println!("  {} {} {}", "✓".green(), tool.name.bold(), version.cyan());
        } else {
            println!(
                "  {} {} {} {}",
                "✗".red(),
                tool.name.bold(),
                version,
                tool.problem.as_deref().unwrap_or("").red()
            );
        }
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    if report.environment.git_repository {
        println!("  {} Inside a git repository", "✓".green());
    } else {
        println!("  {} Not inside a git repository", "✗".red());
    }

    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No CI or logging variables set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {} {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan(),
                format!("({})", var.description).dimmed()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cwd() -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn test_cmd_doctor_text_succeeds() {
        assert!(cmd_doctor(DoctorArgs::default(), false, None, &test_cwd()).is_ok());
    }

    #[test]
    fn test_cmd_doctor_json_succeeds() {
        assert!(cmd_doctor(DoctorArgs::default(), true, None, &test_cwd()).is_ok());
    }

    #[test]
    fn test_doctor_report_probes_both_tools() {
        let report = DoctorReport::gather(None, &test_cwd());
        let names: Vec<_> = report.tools.iter().map(|t| t.name).collect();
        assert_eq!(names, ["git", "gh"]);
    }

    #[test]
    fn missing_tool_reports_problem() {
        let status = ToolStatus::probe("rcbump-no-such-tool", &detect::MIN_GH_VERSION);
        assert!(!status.on_path);
        assert!(!status.is_ok());
    }

    #[test]
    fn explicit_config_file_is_reported_as_found() {
        let explicit = camino::Utf8PathBuf::from("/etc/rcbump/ci.toml");
        let report = DoctorReport::gather(Some(&explicit), &camino::Utf8PathBuf::from("/nonexistent"));
        assert!(report.config.found);
        assert_eq!(report.config.file.as_deref(), Some("/etc/rcbump/ci.toml"));
    }
}
