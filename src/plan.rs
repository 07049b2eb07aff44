//! Planning: which file goes where, computed without touching the filesystem.
//!
//! A [`Plan`] is a recipe rather than a list. Every call to
//! [`Plan::operations`] re-reads the source directory and yields one
//! [`PlannedOperation`] per eligible file, sorted by file name. Destinations
//! are tentative: collisions are resolved by the executor at move time.

use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::{Category, CategoryTable};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// One intended move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOperation {
    pub source_path: PathBuf,
    /// Tentative destination: `<source dir>/<category>/<file name>`.
    pub destination_path: PathBuf,
    pub category: Category,
}

impl PlannedOperation {
    /// The category directory the file moves into.
    pub fn category_dir(&self) -> &Path {
        self.destination_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
    }

    /// The file name, for display.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds plans for source directories.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    table: &'a CategoryTable,
    filters: &'a CompiledFilters,
    skip: Vec<PathBuf>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(table: &'a CategoryTable, filters: &'a CompiledFilters) -> Self {
        Self {
            table,
            filters,
            skip: Vec::new(),
        }
    }

    /// Never plan a move for `path`. Used for the manifest file when it lives
    /// inside the directory being organized.
    pub fn skip_path(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.skip
            .push(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        self
    }

    /// Validates `source_dir` and returns a plan for it.
    ///
    /// # Errors
    ///
    /// `SourceNotFound` if `source_dir` does not exist or is not a directory.
    pub fn build_plan(&self, source_dir: &Path) -> OrganizeResult<Plan<'a>> {
        let not_found = |reason: String| OrganizeError::SourceNotFound {
            path: source_dir.to_path_buf(),
            reason,
        };

        let metadata = fs::metadata(source_dir).map_err(|e| not_found(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(not_found("not a directory".to_string()));
        }
        let source_dir = fs::canonicalize(source_dir).map_err(|e| not_found(e.to_string()))?;

        debug!(source = %source_dir.display(), "plan created");
        Ok(Plan {
            source_dir,
            table: self.table,
            filters: self.filters,
            skip: self.skip.clone(),
        })
    }
}

/// The restartable plan for one source directory.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    source_dir: PathBuf,
    table: &'a CategoryTable,
    filters: &'a CompiledFilters,
    skip: Vec<PathBuf>,
}

impl<'a> Plan<'a> {
    /// Canonical path of the directory being organized.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Walks the source directory and returns the planned operations, lazily
    /// classified, in file-name order.
    ///
    /// Only regular files directly inside the directory are considered.
    /// Subdirectories (category folders included), symlinks, skipped paths and
    /// filtered files never appear.
    pub fn operations(&self) -> OrganizeResult<Operations<'_, 'a>> {
        let entries = fs::read_dir(&self.source_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OrganizeError::SourceNotFound {
                    path: self.source_dir.clone(),
                    reason: e.to_string(),
                }
            } else {
                OrganizeError::ReadDirFailed {
                    path: self.source_dir.clone(),
                    source: e,
                }
            }
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .filter(|path| !self.skip.contains(path))
            .filter(|path| {
                let keep = self.filters.should_include(path);
                if !keep {
                    trace!(path = %path.display(), "excluded by filters");
                }
                keep
            })
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Operations {
            plan: self,
            files: files.into_iter(),
        })
    }

    /// True if the directory currently has nothing to organize.
    pub fn is_empty(&self) -> OrganizeResult<bool> {
        Ok(self.operations()?.next().is_none())
    }

    fn plan_file(&self, source_path: PathBuf) -> Option<PlannedOperation> {
        let file_name = source_path.file_name()?.to_owned();
        let category = self.table.classify(&file_name.to_string_lossy());
        let destination_path = self
            .source_dir
            .join(category.dir_name())
            .join(&file_name);

        Some(PlannedOperation {
            source_path,
            destination_path,
            category,
        })
    }
}

/// Iterator over the operations of one directory walk.
#[derive(Debug)]
pub struct Operations<'p, 'a> {
    plan: &'p Plan<'a>,
    files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Operations<'_, '_> {
    type Item = PlannedOperation;

    fn next(&mut self) -> Option<Self::Item> {
        for path in self.files.by_ref() {
            if let Some(op) = self.plan.plan_file(path) {
                return Some(op);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.files.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn collect(source: &Path) -> Vec<PlannedOperation> {
        let table = CategoryTable::default();
        let filters = CompiledFilters::default();
        let builder = PlanBuilder::new(&table, &filters);
        let plan = builder.build_plan(source).unwrap();
        plan.operations().unwrap().collect()
    }

    #[test]
    fn test_plan_maps_files_to_category_dirs() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["report.pdf", "photo.jpg", "script.py"] {
            fs::write(temp_dir.path().join(name), name).unwrap();
        }
        let root = fs::canonicalize(temp_dir.path()).unwrap();

        let ops = collect(temp_dir.path());

        let pairs: Vec<_> = ops
            .iter()
            .map(|op| (op.source_path.clone(), op.destination_path.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (root.join("photo.jpg"), root.join("images/photo.jpg")),
                (root.join("report.pdf"), root.join("docs/report.pdf")),
                (root.join("script.py"), root.join("code/script.py")),
            ]
        );
        assert_eq!(ops[1].category.as_str(), "docs");
        assert_eq!(ops[1].category_dir(), root.join("docs"));
    }

    #[test]
    fn test_plan_does_not_touch_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("report.pdf"), "x").unwrap();

        let ops = collect(temp_dir.path());
        assert_eq!(ops.len(), 1);
        assert!(temp_dir.path().join("report.pdf").exists());
        assert!(!temp_dir.path().join("docs").exists());
    }

    #[test]
    fn test_plan_skips_directories_and_category_folders() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("docs")).unwrap();
        fs::write(temp_dir.path().join("docs").join("old.pdf"), "x").unwrap();
        fs::create_dir(temp_dir.path().join("projects")).unwrap();
        fs::write(temp_dir.path().join("new.pdf"), "y").unwrap();

        let ops = collect(temp_dir.path());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].file_name(), "new.pdf");
    }

    #[test]
    fn test_plan_includes_dotfiles_and_honours_skip_list() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".hidden.txt"), "x").unwrap();
        fs::write(temp_dir.path().join("manifest.jsonl"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "y").unwrap();

        let table = CategoryTable::default();
        let filters = Config::default().compile_filters().unwrap();
        let builder = PlanBuilder::new(&table, &filters)
            .skip_path(temp_dir.path().join("manifest.jsonl"));
        let plan = builder.build_plan(temp_dir.path()).unwrap();
        let names: Vec<_> = plan.operations().unwrap().map(|op| op.file_name()).collect();

        assert_eq!(names, vec![".hidden.txt".to_string(), "notes.txt".to_string()]);
    }

    #[test]
    fn test_plan_filters_by_file_name_not_full_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".important"), "x").unwrap();
        fs::write(temp_dir.path().join(".other"), "y").unwrap();

        let mut config = Config::default();
        config.filters.enable_hidden_files = false;
        config.filters.include.patterns = vec![".important".to_string()];
        let filters = config.compile_filters().unwrap();
        let table = CategoryTable::default();
        let builder = PlanBuilder::new(&table, &filters);
        let plan = builder.build_plan(temp_dir.path()).unwrap();
        let names: Vec<_> = plan.operations().unwrap().map(|op| op.file_name()).collect();

        assert_eq!(names, vec![".important".to_string()]);
    }

    #[test]
    fn test_plan_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "x").unwrap();

        let table = CategoryTable::default();
        let filters = CompiledFilters::default();
        let builder = PlanBuilder::new(&table, &filters);
        let plan = builder.build_plan(temp_dir.path()).unwrap();

        assert_eq!(plan.operations().unwrap().count(), 1);
        fs::write(temp_dir.path().join("b.txt"), "y").unwrap();
        assert_eq!(plan.operations().unwrap().count(), 2);
    }

    #[test]
    fn test_empty_directory_gives_empty_plan() {
        let temp_dir = TempDir::new().unwrap();
        let table = CategoryTable::default();
        let filters = CompiledFilters::default();
        let builder = PlanBuilder::new(&table, &filters);
        let plan = builder.build_plan(temp_dir.path()).unwrap();

        assert!(plan.is_empty().unwrap());
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let table = CategoryTable::default();
        let filters = CompiledFilters::default();
        let builder = PlanBuilder::new(&table, &filters);

        let missing = builder.build_plan(&temp_dir.path().join("nope"));
        assert!(matches!(missing, Err(OrganizeError::SourceNotFound { .. })));

        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let not_dir = builder.build_plan(&file);
        assert!(matches!(not_dir, Err(OrganizeError::SourceNotFound { .. })));
    }
}
