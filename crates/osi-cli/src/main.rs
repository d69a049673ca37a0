//! sp-osi CLI - merge StorPool driver code into installed OpenStack components
//!
//! Commands:
//! - list: show the files managed for each component
//! - rules: show the extraction rules of one managed file
//! - merge: merge StorPool templates into a component's files
//! - restore: put back the originals saved by an in-place merge

mod backup;
mod config;
mod output;
mod process;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use backup::BackupManager;
use config::Config;
use osi_rules::{RegistryError, RuleSetRegistry};
use output::{print_listing, print_rules, OutputFormat, Reporter};
use process::{plan_component, same_path, write_plan, MergeRoots};

#[derive(Parser)]
#[command(name = "sp-osi")]
#[command(version = "0.1.0")]
#[command(about = "Merge StorPool driver code into installed OpenStack components")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Output format: text, json, diff
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(long, global = true, conflicts_with = "format")]
    json: bool,

    /// Path to config file (default: auto-detect .sp-osi.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long, global = true)]
    no_config: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the files managed for a component (or all components)
    List {
        /// Component name, e.g. os_brick
        component: Option<String>,
    },

    /// Show the extraction rules for one managed file
    Rules {
        component: String,
        /// Path of the file relative to the component root
        path: String,
    },

    /// Merge the StorPool templates into a component's files
    Merge {
        component: String,

        /// Directory holding the StorPool templates for this component
        #[arg(long, value_name = "DIR")]
        templates: Option<PathBuf>,

        /// Installed component directory to merge into
        #[arg(long, value_name = "DIR")]
        source: PathBuf,

        /// Where to write the merged files (default: in place, over --source)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        check: bool,

        /// Do not back up originals when merging in place
        #[arg(long)]
        no_backup: bool,
    },

    /// Restore the originals saved by in-place merges under a directory
    Restore {
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    let output_format = if cli.json {
        OutputFormat::Json
    } else {
        let name = cli
            .format
            .as_deref()
            .or(config.output.format.as_deref())
            .unwrap_or("text");
        OutputFormat::from_str(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid output format '{}'. Valid options: text, json, diff",
                name
            )
        })?
    };

    let registry = RuleSetRegistry::with_defaults()?;

    match cli.command {
        Command::List { component } => {
            let names = match &component {
                Some(name) => vec![name.as_str()],
                None => registry.all_names(),
            };
            let mut files = Vec::new();
            for name in names {
                files.extend(registry.managed_files(name)?);
            }
            print_listing(&files, output_format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Rules { component, path } => {
            let file = registry
                .managed_files(&component)?
                .into_iter()
                .find(|f| f.path == path)
                .ok_or(RegistryError::UnknownFile { component, path })?;
            print_rules(&file, output_format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Merge {
            component,
            templates,
            source,
            dest,
            check,
            no_backup,
        } => {
            let templates = match templates.or_else(|| config.templates_for(&component)) {
                Some(dir) => dir,
                None => bail!(
                    "No template directory for {}: pass --templates or set paths.templates in the config",
                    component
                ),
            };
            let backups = config.backup.enabled && !no_backup;
            let options = MergeOptions {
                check,
                backups,
                verbose: cli.verbose,
                format: output_format,
            };
            merge(&registry, &component, &templates, &source, dest.as_deref(), &options)
        }
        Command::Restore { dir } => {
            if !dir.is_dir() {
                bail!("Not a directory: {}", dir.display());
            }
            let summary = backup::restore(&dir)?;
            if summary.is_empty() {
                println!("No StorPool backups found under {}", dir.display());
            }
            for path in &summary.restored {
                println!("  {} Restored {}", "OK".green(), path.display());
            }
            for path in &summary.removed {
                println!("  {} Removed {}", "OK".green(), path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    if cli.no_config {
        return Ok(Config::default());
    }
    if let Some(path) = &cli.config {
        debug!("Using config {}", path.display());
        return Config::load_path(path);
    }
    match Config::load()? {
        Some((cfg, path)) => {
            debug!("Using config {}", path.display());
            Ok(cfg)
        }
        None => Ok(Config::default()),
    }
}

struct MergeOptions {
    check: bool,
    backups: bool,
    verbose: bool,
    format: OutputFormat,
}

fn merge(
    registry: &RuleSetRegistry,
    component: &str,
    templates: &Path,
    source: &Path,
    dest: Option<&Path>,
    options: &MergeOptions,
) -> Result<ExitCode> {
    let rule_sets = registry.rule_sets(component)?;
    if !source.is_dir() {
        bail!("Component directory does not exist: {}", source.display());
    }
    let dest = dest.unwrap_or(source);
    let in_place = same_path(dest, source);

    info!(
        "Merging {} from {} into {}",
        component,
        templates.display(),
        dest.display()
    );

    let roots = MergeRoots {
        templates,
        source,
        dest,
    };
    let plans = plan_component(rule_sets, &roots)?;

    let mut reporter = Reporter::new(options.format, options.verbose, component);

    if options.check {
        for plan in &plans {
            reporter.report_check(plan);
        }
        let pending = reporter.summary().files_with_changes > 0;
        reporter.finish(true)?;
        return Ok(if pending {
            ExitCode::from(2)
        } else {
            ExitCode::SUCCESS
        });
    }

    let mut backups = BackupManager::new(options.backups && in_place);
    let changed: Vec<PathBuf> = plans
        .iter()
        .filter(|p| p.has_changes())
        .map(|p| p.dest.clone())
        .collect();
    backups.ensure_no_backups(&changed)?;

    for plan in &plans {
        if plan.has_changes() {
            backups.backup_file(&plan.dest)?;
            write_plan(plan)?;
        }
        reporter.report_written(plan);
    }
    if backups.is_enabled() {
        debug!("{} backup(s) written", backups.created().len());
    }

    reporter.finish(false)?;
    Ok(ExitCode::SUCCESS)
}
