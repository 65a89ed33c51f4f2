//! rcbump CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use rcbump::{Cli, Commands, commands};
use rcbump_core::config::ConfigLoader;
use rcbump_core::output;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => usage_error(&err),
    };
    cli.color.apply();

    let result = run(cli);
    if let Err(ref err) = result
        && output::is_github_actions()
    {
        println!("{}", output::failure_annotation(&format!("{err:#}")));
    }
    result
}

/// Report a command-line error the way runtime failures are reported:
/// annotated under GitHub Actions, exit code 1. Help and version output
/// keep clap's own handling.
fn usage_error(err: &clap::Error) -> ! {
    if !err.use_stderr() {
        err.exit();
    }
    if output::is_github_actions() {
        let rendered = err.to_string();
        let first = rendered.lines().next().unwrap_or_default();
        let message = first.strip_prefix("error: ").unwrap_or(first);
        println!("{}", output::failure_annotation(message.trim()));
    }
    let _ = err.print();
    std::process::exit(1);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let config_path = cli
        .config
        .clone()
        .map(camino::Utf8PathBuf::try_from)
        .transpose()
        .map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = config_path {
        loader = loader.with_file(config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config.log_dir.clone(),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let result = match cli.command {
        Commands::Latest(args) => commands::latest::cmd_latest(args, cli.json, &config),
        Commands::Classify(args) => commands::classify::cmd_classify(args, cli.json, &config),
        Commands::Next(args) => commands::next::cmd_next(args, cli.json),
        Commands::Sync(args) => commands::sync::cmd_sync(args, cli.json, &config),
        Commands::Run(args) => commands::run::cmd_run(args, cli.json, &config),
        Commands::Info(args) => {
            commands::info::cmd_info(args, cli.json, &config, config_path.as_deref(), &cwd)
        }
        Commands::Doctor(args) => {
            commands::doctor::cmd_doctor(args, cli.json, config_path.as_deref(), &cwd)
        }
    };
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}
