//! Undo functionality for reverting file organization operations.
//!
//! Moves are reversed newest first, straight from the manifest. Each entry is
//! removed from the manifest as soon as it has been dealt with, so an
//! interrupted undo can simply be run again.

use crate::collision::{CollisionResolver, path_occupied};
use crate::error::{OrganizeError, OrganizeResult};
use crate::executor::remove_dir_if_empty;
use crate::manifest::{Manifest, ManifestEntry};
use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for an undo run.
#[derive(Debug, Clone, Copy, Default)]
pub struct UndoOptions {
    /// Report what would be restored without touching files or the manifest.
    pub dry_run: bool,
    /// Only reverse the most recent batches. `None` reverses everything.
    pub last_batches: Option<NonZeroUsize>,
}

/// Outcome of reversing one manifest entry.
#[derive(Debug)]
pub enum UndoStatus {
    /// The file is back at its original path.
    Restored { path: PathBuf },
    /// The original path was taken, so the file was restored beside it.
    Conflict { path: PathBuf },
    /// The recorded final path no longer exists. The entry was dropped.
    Stale,
    /// Dry run: where the file would be restored to.
    Previewed { target: PathBuf, conflict: bool },
    /// The file could not be moved back. The entry was kept.
    Failed { reason: OrganizeError },
}

/// A manifest entry together with what undo did with it.
#[derive(Debug)]
pub struct UndoResult {
    pub entry: ManifestEntry,
    pub status: UndoStatus,
}

/// Reverses recorded moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct UndoEngine {
    resolver: CollisionResolver,
}

impl UndoEngine {
    pub fn new(resolver: CollisionResolver) -> Self {
        Self { resolver }
    }

    /// Reverses the selected entries of `manifest`, newest first, passing each
    /// result to `on_result` as soon as it is known.
    ///
    /// Restored and stale entries are removed from the manifest one at a time.
    /// If an entry cannot be moved back, undo stops there: that entry and all
    /// older ones stay in the manifest so a later run can retry them.
    ///
    /// Undoing an empty manifest does nothing and succeeds.
    ///
    /// # Errors
    ///
    /// `ManifestIo` if an entry cannot be removed from the manifest after it
    /// has been handled.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reshelf::manifest::Manifest;
    /// use reshelf::undo::{UndoEngine, UndoOptions};
    ///
    /// let mut manifest = Manifest::load("/path/to/manifest.jsonl")?;
    /// let results = UndoEngine::default().undo(&mut manifest, UndoOptions::default(), |r| {
    ///     println!("{} -> {:?}", r.entry.final_path.display(), r.status);
    /// })?;
    /// println!("{} entries processed", results.len());
    /// # Ok::<(), reshelf::OrganizeError>(())
    /// ```
    pub fn undo<F>(
        &self,
        manifest: &mut Manifest,
        options: UndoOptions,
        mut on_result: F,
    ) -> OrganizeResult<Vec<UndoResult>>
    where
        F: FnMut(&UndoResult),
    {
        let count = selected_count(manifest.entries(), options.last_batches);
        debug!(
            selected = count,
            total = manifest.len(),
            dry_run = options.dry_run,
            "starting undo"
        );

        let mut results = Vec::with_capacity(count);

        if options.dry_run {
            let mut reserved = HashSet::new();
            for entry in manifest.entries().iter().rev().take(count) {
                let status = self.preview(entry, &mut reserved);
                let result = UndoResult {
                    entry: entry.clone(),
                    status,
                };
                on_result(&result);
                results.push(result);
            }
            return Ok(results);
        }

        for _ in 0..count {
            let Some(entry) = manifest.entries().last().cloned() else {
                break;
            };

            let status = self.reverse(&entry);
            let stop = matches!(status, UndoStatus::Failed { .. });
            if !stop {
                manifest.pop()?;
            }

            let result = UndoResult { entry, status };
            on_result(&result);
            results.push(result);

            if stop {
                break;
            }
        }

        Ok(results)
    }

    fn reverse(&self, entry: &ManifestEntry) -> UndoStatus {
        if !final_path_present(&entry.final_path) {
            warn!(
                final_path = %entry.final_path.display(),
                "recorded file is gone, dropping stale entry"
            );
            if let Some(dir) = &entry.created_dir {
                remove_dir_if_empty(dir);
            }
            return UndoStatus::Stale;
        }

        match self.restore(entry) {
            Ok((path, false)) => {
                info!(
                    from = %entry.final_path.display(),
                    to = %path.display(),
                    "restored"
                );
                UndoStatus::Restored { path }
            }
            Ok((path, true)) => {
                warn!(
                    original = %entry.original_path.display(),
                    restored_to = %path.display(),
                    "original path is taken, restored under a new name"
                );
                UndoStatus::Conflict { path }
            }
            Err(reason) => {
                warn!(
                    final_path = %entry.final_path.display(),
                    error = %reason,
                    "restore failed"
                );
                UndoStatus::Failed { reason }
            }
        }
    }

    fn restore(&self, entry: &ManifestEntry) -> OrganizeResult<(PathBuf, bool)> {
        let conflict = path_occupied(&entry.original_path);
        let target = if conflict {
            self.resolver.resolve(&entry.original_path)?
        } else {
            entry.original_path.clone()
        };

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| {
                OrganizeError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        fs::rename(&entry.final_path, &target).map_err(|source| OrganizeError::MoveFailed {
            from: entry.final_path.clone(),
            to: target.clone(),
            source,
        })?;

        if let Some(dir) = &entry.created_dir {
            remove_dir_if_empty(dir);
        }

        Ok((target, conflict))
    }

    fn preview(&self, entry: &ManifestEntry, reserved: &mut HashSet<PathBuf>) -> UndoStatus {
        if !final_path_present(&entry.final_path) {
            return UndoStatus::Stale;
        }

        let conflict =
            path_occupied(&entry.original_path) || reserved.contains(&entry.original_path);
        let target = if conflict {
            match self
                .resolver
                .resolve_with(&entry.original_path, |p| reserved.contains(p))
            {
                Ok(path) => path,
                Err(reason) => return UndoStatus::Failed { reason },
            }
        } else {
            entry.original_path.clone()
        };

        reserved.insert(target.clone());
        UndoStatus::Previewed { target, conflict }
    }
}

/// A recorded final path counts as present when something other than a
/// directory is there.
fn final_path_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| !m.is_dir())
}

/// Number of entries at the tail of `entries` that belong to the `last`
/// most recent batches.
fn selected_count(entries: &[ManifestEntry], last: Option<NonZeroUsize>) -> usize {
    let Some(last) = last else {
        return entries.len();
    };

    let mut batches = 0;
    let mut current: Option<&str> = None;
    let mut count = 0;
    for entry in entries.iter().rev() {
        if current != Some(entry.batch.as_str()) {
            batches += 1;
            if batches > last.get() {
                break;
            }
            current = Some(entry.batch.as_str());
        }
        count += 1;
    }
    count
}
