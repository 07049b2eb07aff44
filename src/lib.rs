//! reshelf - sort a directory's files into category subfolders
//!
//! This library classifies files by extension, plans where each one goes,
//! moves them while recording every move in a JSON Lines manifest, and
//! reverses those moves from the manifest on undo. Both directions support a
//! dry run that touches nothing.

pub mod cli;
pub mod collision;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_category;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod plan;
pub mod summary;
pub mod undo;

pub use config::{CompiledFilters, Config, ConfigError, ManifestPolicy};
pub use error::{OrganizeError, OrganizeResult};
pub use executor::{ExecutionMode, Executor, OperationResult, OperationStatus};
pub use file_category::{Category, CategoryTable};
pub use manifest::{Manifest, ManifestEntry};
pub use plan::{Plan, PlanBuilder, PlannedOperation};
pub use summary::RunSummary;
pub use undo::{UndoEngine, UndoOptions, UndoResult, UndoStatus};

pub use cli::{OrganizeCommand, Settings, run_cli};
