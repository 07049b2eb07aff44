//! Command-line interface module for reshelf.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Loading settings (configuration and manifest location)
//! - Driving organize and undo runs and reporting their results

use crate::collision::CollisionResolver;
use crate::config::{Config, ManifestPolicy};
use crate::error::OrganizeResult;
use crate::executor::{ExecutionMode, Executor, OperationStatus};
use crate::file_category::CategoryTable;
use crate::manifest::Manifest;
use crate::output::OutputFormatter;
use crate::plan::{PlanBuilder, PlannedOperation};
use crate::summary::RunSummary;
use crate::undo::{UndoEngine, UndoOptions, UndoStatus};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Sort a directory's files into category subfolders, and put them back.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Configuration file (default: ./.reshelfrc.toml, then ~/.config/reshelf/config.toml).
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Manifest file, overriding the configured location.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub manifest: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: OrganizeCommand,
}

/// Represents a CLI command to execute.
#[derive(Subcommand, Debug, Clone)]
pub enum OrganizeCommand {
    /// Move the files of a directory into category subfolders.
    Organize {
        /// Directory to organize.
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Show what would be moved without changing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Move organized files back where they came from, newest first.
    Undo {
        /// Show what would be restored without changing anything.
        #[arg(long)]
        dry_run: bool,
        /// Only undo the N most recent organize runs.
        #[arg(long, value_name = "N")]
        last: Option<NonZeroUsize>,
    },
}

/// Everything a run needs besides its command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub manifest_path: PathBuf,
}

impl Settings {
    pub fn new(config: Config, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            manifest_path: manifest_path.into(),
        }
    }

    /// Loads the configuration and settles the manifest location.
    /// `manifest_override` wins over the configured path.
    pub fn load(
        config_path: Option<&Path>,
        manifest_override: Option<&Path>,
    ) -> OrganizeResult<Self> {
        let config = Config::load(config_path)?;
        let manifest_path = manifest_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.manifest_path());
        Ok(Self::new(config, manifest_path))
    }

    fn resolver(&self) -> CollisionResolver {
        CollisionResolver::new(self.config.collisions.max_attempts)
    }
}

/// Runs one command and returns its summary.
///
/// An `Err` is a fatal error: nothing was processed, or processing could not
/// go on. Per-file problems are reported in the summary instead.
///
/// # Examples
///
/// ```no_run
/// use reshelf::cli::{run_cli, OrganizeCommand, Settings};
/// use std::path::PathBuf;
///
/// let settings = Settings::load(None, None)?;
/// let command = OrganizeCommand::Organize {
///     dir: PathBuf::from("/path/to/downloads"),
///     dry_run: true,
/// };
/// let summary = run_cli(&command, &settings)?;
/// std::process::exit(summary.exit_code().into());
/// # Ok::<(), reshelf::OrganizeError>(())
/// ```
pub fn run_cli(command: &OrganizeCommand, settings: &Settings) -> OrganizeResult<RunSummary> {
    match command {
        OrganizeCommand::Organize { dir, dry_run } => organize_directory(dir, *dry_run, settings),
        OrganizeCommand::Undo { dry_run, last } => undo_organization(
            UndoOptions {
                dry_run: *dry_run,
                last_batches: *last,
            },
            settings,
        ),
    }
}

/// Plans `dir` and either previews or performs the moves.
fn organize_directory(dir: &Path, dry_run: bool, settings: &Settings) -> OrganizeResult<RunSummary> {
    let config = &settings.config;
    let table = CategoryTable::from_config(config);
    let filters = config.compile_filters()?;
    let plan = PlanBuilder::new(&table, &filters)
        .skip_path(&settings.manifest_path)
        .build_plan(dir)?;

    let operations: Vec<PlannedOperation> = plan.operations()?.collect();
    if operations.is_empty() {
        OutputFormatter::warning("No files found to organize.");
        return Ok(RunSummary::default());
    }

    let executor = Executor::new(settings.resolver())
        .replacing_manifest(config.manifest.policy == ManifestPolicy::Overwrite);

    if dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Files in {} would be organized as follows:",
            plan.source_dir().display()
        ));
        let results = executor.execute(
            operations,
            ExecutionMode::DryRun,
            OutputFormatter::operation_result,
        );
        OutputFormatter::summary_table(&results);

        let summary = RunSummary::from_operations(&results);
        OutputFormatter::run_summary(&summary);
        OutputFormatter::dry_run_notice("No files were modified.");
        return Ok(summary);
    }

    let mut manifest = Manifest::load(&settings.manifest_path)?;

    OutputFormatter::info(&format!(
        "Organizing contents of: {}",
        plan.source_dir().display()
    ));
    let pb = OutputFormatter::create_progress_bar(operations.len() as u64);
    let results = executor.execute(operations, ExecutionMode::Live(&mut manifest), |result| {
        pb.suspend(|| OutputFormatter::operation_result(result));
        pb.inc(1);
    });
    pb.finish_and_clear();

    let summary = RunSummary::from_operations(&results);
    OutputFormatter::run_summary(&summary);
    if summary.succeeded > 0 {
        OutputFormatter::info(&format!(
            "Moves recorded in {}. Run 'reshelf undo' to revert them.",
            manifest.path().display()
        ));
    }
    if results
        .iter()
        .any(|r| matches!(r.status, OperationStatus::Failed { .. }))
    {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
    Ok(summary)
}

/// Reverses recorded moves from the manifest.
fn undo_organization(options: UndoOptions, settings: &Settings) -> OrganizeResult<RunSummary> {
    let mut manifest = Manifest::load(&settings.manifest_path)?;
    if manifest.is_empty() {
        OutputFormatter::info("Nothing to undo.");
        return Ok(RunSummary::default());
    }

    if options.dry_run {
        OutputFormatter::dry_run_notice("Files would be restored as follows:");
    } else {
        OutputFormatter::info("Undoing previous organization...");
    }

    let engine = UndoEngine::new(settings.resolver());
    let results = engine.undo(&mut manifest, options, OutputFormatter::undo_result)?;

    let summary = RunSummary::from_undo(&results);
    OutputFormatter::run_summary(&summary);
    if options.dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    } else if results
        .iter()
        .any(|r| matches!(r.status, UndoStatus::Failed { .. }))
    {
        OutputFormatter::warning(&format!(
            "Undo stopped early; {} entries remain in the manifest. Fix the issue above and run undo again.",
            manifest.len()
        ));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_organize() {
        let cli = Cli::try_parse_from(["reshelf", "organize", "/tmp/in", "--dry-run"]).unwrap();
        match cli.command {
            OrganizeCommand::Organize { dir, dry_run } => {
                assert_eq!(dir, PathBuf::from("/tmp/in"));
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_undo_with_globals() {
        let cli = Cli::try_parse_from([
            "reshelf",
            "undo",
            "--last",
            "2",
            "--manifest",
            "/tmp/m.jsonl",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.manifest, Some(PathBuf::from("/tmp/m.jsonl")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            OrganizeCommand::Undo { dry_run, last } => {
                assert!(!dry_run);
                assert_eq!(last, NonZeroUsize::new(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_last_zero_is_rejected() {
        assert!(Cli::try_parse_from(["reshelf", "undo", "--last", "0"]).is_err());
    }

    #[test]
    fn test_manifest_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[manifest]\npath = \"/somewhere/else.jsonl\"\n",
        )
        .unwrap();
        let override_path = temp_dir.path().join("m.jsonl");

        let settings = Settings::load(Some(config_path.as_path()), Some(override_path.as_path())).unwrap();
        assert_eq!(settings.manifest_path, override_path);

        let settings = Settings::load(Some(config_path.as_path()), None).unwrap();
        assert_eq!(settings.manifest_path, PathBuf::from("/somewhere/else.jsonl"));
    }
}
