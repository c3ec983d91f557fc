//! Bootup - reconcile a GitOps boot configuration with its version stream
//!
//! Checks whether the version stream recorded in the dev environment's
//! requirements file has moved, replays the matching boot configuration
//! history onto a fresh branch and opens (or refreshes) one labelled pull
//! request with the result.

#![forbid(unsafe_code)]

mod devenv;
mod upgrade;

use anyhow::{Context, Result};
use bootup_common::{
    CliGit, ConfigError, ErrorCode, GitError, LogConfig, LogFormat, ProviderFactory,
    UpgradeConfig, init_logging,
};
use clap::{Args, Parser, Subcommand};
use devenv::{DevEnvError, DevEnvironmentLocator, KubectlLocator, StaticLocator};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use upgrade::{CheckReport, Orchestrator, UpgradeError, UpgradeOutcome, UpgradeSettings};

#[derive(Parser)]
#[command(name = "bootup")]
#[command(author, version, about = "Upgrade a GitOps boot configuration to the latest version stream")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade the boot configuration and open a pull request
    Upgrade(Target),

    /// Report available upgrades without changing anything
    Check {
        #[command(flatten)]
        target: Target,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct Target {
    /// GitOps working directory (cloned from the dev environment if omitted)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Config file (default: ~/.config/bootup/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boot configuration repository to upgrade from
    #[arg(long)]
    boot_config_url: Option<String>,

    /// Trunk branch of the version stream and the working directory
    #[arg(long)]
    trunk: Option<String>,

    /// Clone URL of the dev environment repository
    #[arg(long, env = "BOOTUP_DEV_ENV_URL")]
    dev_env_url: Option<String>,

    /// Namespace of the dev environment resource
    #[arg(short, long)]
    namespace: Option<String>,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    current_ref: &'a str,
    version_stream_upgrade: Option<&'a str>,
    boot_config_from: Option<&'a str>,
    boot_config_to: Option<&'a str>,
    boot_config_upgrade: bool,
}

impl<'a> From<&'a CheckReport> for CheckSummary<'a> {
    fn from(report: &'a CheckReport) -> Self {
        let boot = report.boot_config.as_ref();
        Self {
            current_ref: &report.current_ref,
            version_stream_upgrade: report.candidate_ref.as_deref(),
            boot_config_from: boot.map(|d| d.current.display_version.as_str()),
            boot_config_to: boot.map(|d| d.candidate.display_version.as_str()),
            boot_config_upgrade: boot.is_some_and(|d| d.upgrade_needed()),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("{}", ErrorCode::InternalLoggingError.entry().format_brief());
            eprintln!("error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(code) = error_code(&err) {
                eprint!("{}", code.entry().format_full());
            }
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Upgrade(target) => {
            let (config, dir) = prepare(&target)?;
            let git = CliGit::locate()?;
            let providers = ProviderFactory::from_config(&config);
            let orchestrator =
                Orchestrator::new(&git, &providers, UpgradeSettings::from_config(&config), dir);

            match orchestrator.run()? {
                UpgradeOutcome::UpToDate { version_stream_ref } => {
                    println!("Already up to date at {}", version_stream_ref);
                }
                UpgradeOutcome::Published {
                    version_stream_ref,
                    boot_config,
                    pull_request,
                } => {
                    println!("Version stream upgraded to {}", version_stream_ref);
                    if let Some(boot) = boot_config {
                        println!(
                            "Boot config upgraded from v{} to v{} ({} commits applied, {} skipped)",
                            boot.from_version,
                            boot.to_version,
                            boot.applied.len(),
                            boot.skipped.len()
                        );
                        for commit in &boot.skipped {
                            println!("  skipped merge commit {}", commit);
                        }
                    }
                    println!("Pull request: {}", pull_request.url);
                }
            }
            Ok(())
        }
        Commands::Check { target, json } => {
            let (config, dir) = prepare(&target)?;
            let git = CliGit::locate()?;
            let providers = ProviderFactory::from_config(&config);
            let report =
                Orchestrator::new(&git, &providers, UpgradeSettings::from_config(&config), dir)
                    .check()?;

            let summary = CheckSummary::from(&report);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            match summary.version_stream_upgrade {
                Some(sha) => println!("Version stream: {} -> {}", summary.current_ref, sha),
                None => println!("Version stream: up to date at {}", summary.current_ref),
            }
            if let (Some(from), Some(to)) = (summary.boot_config_from, summary.boot_config_to) {
                if summary.boot_config_upgrade {
                    println!("Boot config: v{} -> v{}", from, to);
                } else {
                    println!("Boot config: no upgrade (v{})", from);
                }
            }
            Ok(())
        }
    }
}

/// Load configuration, apply flag overrides and find the working directory.
fn prepare(target: &Target) -> Result<(UpgradeConfig, PathBuf)> {
    let mut config = UpgradeConfig::load(target.config.as_deref())?;
    if let Some(trunk) = &target.trunk {
        config.set_trunk_branch(trunk.clone(), "--trunk");
    }
    if let Some(url) = &target.boot_config_url {
        config.set_boot_config_url(url.clone(), "--boot-config-url");
    }
    if let Some(namespace) = &target.namespace {
        config.set_dev_env_namespace(namespace.clone(), "--namespace");
    }
    config.validate()?;
    for line in config.describe() {
        tracing::debug!("{}", line);
    }

    let dir = match &target.dir {
        Some(dir) => dir.clone(),
        None => {
            let git = CliGit::locate()?;
            let locator: Box<dyn DevEnvironmentLocator> = match &target.dev_env_url {
                Some(url) => Box::new(StaticLocator(url.clone())),
                None => Box::new(KubectlLocator::locate()?),
            };
            devenv::clone_dev_environment(&git, locator.as_ref(), &config.dev_env_namespace.value)
                .context("failed to clone the dev environment")?
        }
    };
    info!(dir = %dir.display(), "working directory");
    Ok((config, dir))
}

/// Catalog code for the innermost known error in the chain.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<UpgradeError>() {
            Some(e.error_code())
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.error_code())
        } else if let Some(e) = cause.downcast_ref::<DevEnvError>() {
            Some(e.error_code())
        } else {
            cause.downcast_ref::<GitError>().map(GitError::error_code)
        }
    })
}
