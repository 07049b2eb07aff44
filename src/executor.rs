//! Applies planned operations, either for real or as a preview.
//!
//! A live run handles one operation at a time, in plan order: make sure the
//! category directory exists, pick a free destination, rename the file, then
//! record the move in the manifest. An operation either completes all of that
//! or leaves no trace; a failure is reported on its result and the next
//! operation is attempted regardless.
//!
//! A dry run performs the same decisions against the current filesystem state
//! without changing anything, and never opens the manifest.

use crate::collision::{CollisionResolver, path_occupied};
use crate::error::{OrganizeError, OrganizeResult};
use crate::manifest::{Manifest, ManifestEntry};
use crate::plan::PlannedOperation;
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// How [`Executor::execute`] applies a plan.
#[derive(Debug)]
pub enum ExecutionMode<'m> {
    /// Report what would happen.
    DryRun,
    /// Move files and record each move in the manifest.
    Live(&'m mut Manifest),
}

/// Outcome of a single planned operation.
#[derive(Debug)]
pub enum OperationStatus {
    /// The file was moved and the move recorded.
    Moved {
        final_path: PathBuf,
        /// This move created the category directory.
        created_dir: bool,
    },
    /// Dry run: where the file would go.
    Previewed {
        destination: PathBuf,
        /// The category directory does not exist yet and would be created.
        creates_dir: bool,
    },
    /// Nothing was moved or recorded.
    Failed { reason: OrganizeError },
}

/// A planned operation together with what happened to it.
#[derive(Debug)]
pub struct OperationResult {
    pub operation: PlannedOperation,
    pub status: OperationStatus,
}

/// Runs plans against the filesystem.
#[derive(Debug, Clone)]
pub struct Executor {
    resolver: CollisionResolver,
    batch: String,
    replace_manifest: bool,
}

impl Executor {
    /// Creates an executor with a fresh batch id.
    pub fn new(resolver: CollisionResolver) -> Self {
        Self {
            resolver,
            batch: new_batch_id(),
            replace_manifest: false,
        }
    }

    /// Makes a live run discard the manifest's earlier entries, right before
    /// recording its first move. A run that moves nothing keeps them.
    pub fn replacing_manifest(mut self, replace: bool) -> Self {
        self.replace_manifest = replace;
        self
    }

    /// Overrides the batch id stamped on manifest entries.
    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = batch.into();
        self
    }

    pub fn batch(&self) -> &str {
        &self.batch
    }

    /// Applies `operations` in order, passing each result to `on_result` as
    /// soon as it is known, and returns all results.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reshelf::collision::CollisionResolver;
    /// use reshelf::config::CompiledFilters;
    /// use reshelf::executor::{ExecutionMode, Executor};
    /// use reshelf::file_category::CategoryTable;
    /// use reshelf::manifest::Manifest;
    /// use reshelf::plan::PlanBuilder;
    /// use std::path::Path;
    ///
    /// let table = CategoryTable::default();
    /// let filters = CompiledFilters::default();
    /// let plan = PlanBuilder::new(&table, &filters)
    ///     .build_plan(Path::new("/path/to/downloads"))?;
    /// let mut manifest = Manifest::load("/path/to/manifest.jsonl")?;
    ///
    /// let executor = Executor::new(CollisionResolver::default());
    /// let results = executor.execute(
    ///     plan.operations()?,
    ///     ExecutionMode::Live(&mut manifest),
    ///     |result| println!("{:?}", result.status),
    /// );
    /// println!("{} operations", results.len());
    /// # Ok::<(), reshelf::OrganizeError>(())
    /// ```
    pub fn execute<I, F>(
        &self,
        operations: I,
        mode: ExecutionMode<'_>,
        mut on_result: F,
    ) -> Vec<OperationResult>
    where
        I: IntoIterator<Item = PlannedOperation>,
        F: FnMut(&OperationResult),
    {
        let mut results = Vec::new();
        let mut emit = |result: OperationResult| {
            on_result(&result);
            results.push(result);
        };

        match mode {
            ExecutionMode::DryRun => {
                let mut reserved = HashSet::new();
                let mut announced_dirs = HashSet::new();
                for operation in operations {
                    let status = self.preview(&operation, &mut reserved, &mut announced_dirs);
                    emit(OperationResult { operation, status });
                }
            }
            ExecutionMode::Live(manifest) => {
                let mut discard_pending = self.replace_manifest && !manifest.is_empty();
                for operation in operations {
                    let status = match self.apply(&operation, manifest, &mut discard_pending) {
                        Ok((final_path, created_dir)) => OperationStatus::Moved {
                            final_path,
                            created_dir,
                        },
                        Err(reason) => {
                            warn!(
                                source = %operation.source_path.display(),
                                error = %reason,
                                "move failed"
                            );
                            OperationStatus::Failed { reason }
                        }
                    };
                    emit(OperationResult { operation, status });
                }
            }
        }

        results
    }

    fn preview(
        &self,
        operation: &PlannedOperation,
        reserved: &mut HashSet<PathBuf>,
        announced_dirs: &mut HashSet<PathBuf>,
    ) -> OperationStatus {
        let dir = operation.category_dir();
        if path_occupied(dir) && !dir.is_dir() {
            return OperationStatus::Failed {
                reason: blocked_dir_error(dir),
            };
        }
        let creates_dir = !dir.is_dir() && announced_dirs.insert(dir.to_path_buf());

        match self
            .resolver
            .resolve_with(&operation.destination_path, |p| reserved.contains(p))
        {
            Ok(destination) => {
                debug!(
                    source = %operation.source_path.display(),
                    destination = %destination.display(),
                    "dry run"
                );
                reserved.insert(destination.clone());
                OperationStatus::Previewed {
                    destination,
                    creates_dir,
                }
            }
            Err(reason) => OperationStatus::Failed { reason },
        }
    }

    fn apply(
        &self,
        operation: &PlannedOperation,
        manifest: &mut Manifest,
        discard_pending: &mut bool,
    ) -> OrganizeResult<(PathBuf, bool)> {
        let dir = operation.category_dir();
        let created_dir = ensure_category_dir(dir)?;

        let final_path = match self
            .resolver
            .resolve_with(&operation.destination_path, |p| manifest.claims(p))
        {
            Ok(path) => path,
            Err(e) => {
                if created_dir {
                    remove_dir_if_empty(dir);
                }
                return Err(e);
            }
        };

        if let Err(source) = fs::rename(&operation.source_path, &final_path) {
            if created_dir {
                remove_dir_if_empty(dir);
            }
            return Err(OrganizeError::MoveFailed {
                from: operation.source_path.clone(),
                to: final_path,
                source,
            });
        }

        let entry = ManifestEntry {
            original_path: operation.source_path.clone(),
            final_path: final_path.clone(),
            timestamp: Utc::now(),
            batch: self.batch.clone(),
            category: operation.category.as_str().to_string(),
            created_dir: created_dir.then(|| dir.to_path_buf()),
        };

        if let Err(e) = record(manifest, entry, discard_pending) {
            // Unrecorded moves cannot be undone, so put the file back.
            match fs::rename(&final_path, &operation.source_path) {
                Ok(()) => {
                    if created_dir {
                        remove_dir_if_empty(dir);
                    }
                }
                Err(rollback) => error!(
                    source = %operation.source_path.display(),
                    moved_to = %final_path.display(),
                    error = %rollback,
                    "move could not be recorded or rolled back"
                ),
            }
            return Err(e);
        }

        info!(
            source = %operation.source_path.display(),
            destination = %final_path.display(),
            category = %operation.category,
            "moved"
        );
        Ok((final_path, created_dir))
    }
}

fn record(
    manifest: &mut Manifest,
    entry: ManifestEntry,
    discard_pending: &mut bool,
) -> OrganizeResult<()> {
    if *discard_pending {
        info!(
            manifest = %manifest.path().display(),
            discarded = manifest.len(),
            "overwrite policy, discarding earlier entries"
        );
        manifest.clear()?;
        *discard_pending = false;
    }
    manifest.append(entry)
}

/// Creates `dir` if needed. Returns true if this call created it.
fn ensure_category_dir(dir: &Path) -> OrganizeResult<bool> {
    match fs::create_dir(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "created category directory");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(false),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(blocked_dir_error(dir)),
        Err(source) => Err(OrganizeError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

fn blocked_dir_error(dir: &Path) -> OrganizeError {
    OrganizeError::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source: std::io::Error::new(
            ErrorKind::AlreadyExists,
            "a non-directory is in the way",
        ),
    }
}

/// Removes `dir` if it is empty. Failure is only logged.
pub(crate) fn remove_dir_if_empty(dir: &Path) {
    match fs::remove_dir(dir) {
        Ok(()) => debug!(dir = %dir.display(), "removed empty directory"),
        Err(e) => debug!(dir = %dir.display(), error = %e, "directory kept"),
    }
}

/// Batch ids sort chronologically and are unique per run.
fn new_batch_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string()
}
