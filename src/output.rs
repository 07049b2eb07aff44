//! Output formatting and styling module.
//!
//! Everything the user reads on stdout goes through [`OutputFormatter`]: one
//! line per organize or undo result, the dry-run category table and the final
//! summary. The core never calls into this module; it only hands over results.

use crate::executor::{OperationResult, OperationStatus};
use crate::summary::RunSummary;
use crate::undo::{UndoResult, UndoStatus};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Per-entry result lines, progress bars and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reshelf::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for a live run. It draws on stderr.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reshelf::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb
    }

    /// Prints one organize result.
    pub fn operation_result(result: &OperationResult) {
        let name = result.operation.file_name();
        match &result.status {
            OperationStatus::Moved { final_path, .. } => {
                println!(" {} {} → {}", "✓".green(), name, final_path.display());
            }
            OperationStatus::Previewed {
                destination,
                creates_dir,
            } => {
                let note = if *creates_dir {
                    format!(" (creates {}/)", result.operation.category)
                } else {
                    String::new()
                };
                println!(
                    " - {} → {}{}",
                    name,
                    destination.display(),
                    note.dimmed()
                );
            }
            OperationStatus::Failed { reason } => {
                println!(" {} {}: {}", "✗".red(), name, reason.to_string().red());
            }
        }
    }

    /// Prints one undo result.
    pub fn undo_result(result: &UndoResult) {
        let from = result.entry.final_path.display();
        match &result.status {
            UndoStatus::Restored { path } => {
                println!(" {} {} → {}", "✓".green(), from, path.display());
            }
            UndoStatus::Conflict { path } => {
                println!(
                    " {} {} → {} {}",
                    "⚠".yellow(),
                    from,
                    path.display(),
                    "(original path taken)".yellow()
                );
            }
            UndoStatus::Stale => {
                println!(
                    " {} {} {}",
                    "⚠".yellow(),
                    from,
                    "(no longer there, entry dropped)".yellow()
                );
            }
            UndoStatus::Previewed { target, conflict } => {
                let note = if *conflict { " (original path taken)" } else { "" };
                println!(" - {} → {}{}", from, target.display(), note.yellow());
            }
            UndoStatus::Failed { reason } => {
                println!(" {} {}: {}", "✗".red(), from, reason.to_string().red());
            }
        }
    }

    /// Prints a table of how many files each category would receive.
    pub fn summary_table(results: &[OperationResult]) {
        let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for result in results {
            if matches!(result.status, OperationStatus::Failed { .. }) {
                continue;
            }
            *category_counts
                .entry(result.operation.category.as_str())
                .or_insert(0) += 1;
        }
        let total_files: usize = category_counts.values().sum();

        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // "Category"

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = max_category_len
        );
    }

    /// Prints the final counts of a run.
    pub fn run_summary(summary: &RunSummary) {
        let mut parts = Vec::new();
        if summary.succeeded > 0 {
            parts.push(format!("{} done", summary.succeeded).green().to_string());
        }
        if summary.previewed > 0 {
            parts.push(format!("{} previewed", summary.previewed).cyan().to_string());
        }
        if summary.conflicts > 0 {
            parts.push(format!("{} conflicts", summary.conflicts).yellow().to_string());
        }
        if summary.stale > 0 {
            parts.push(format!("{} stale", summary.stale).yellow().to_string());
        }
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed).red().to_string());
        }
        if parts.is_empty() {
            parts.push("nothing to do".to_string());
        }

        let line = parts.join(", ");
        if summary.is_success() {
            Self::success(&line);
        } else {
            Self::warning(&line);
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
