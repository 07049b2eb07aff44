//! Destination name collision resolution.
//!
//! An occupied destination `name.ext` is retried as `name (1).ext`,
//! `name (2).ext`, ... until a free name turns up. The suffix goes before the
//! last extension (`archive.tar.gz` becomes `archive.tar (1).gz`); names with
//! no extension get it at the end (`.env` becomes `.env (1)`).
//!
//! Occupancy is checked against the filesystem at call time, one candidate at
//! a time, so the resolver must be consulted right before each move.

use crate::config::DEFAULT_MAX_COLLISION_ATTEMPTS;
use crate::error::{OrganizeError, OrganizeResult};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Typical POSIX file name limit, in bytes.
const MAX_FILENAME_LEN: usize = 255;

/// Finds a free path for a tentative destination.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    max_attempts: u32,
}

impl CollisionResolver {
    /// `max_attempts` is the highest numeric suffix tried. Values below 1 are
    /// raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns `candidate` if nothing exists there, otherwise the first free
    /// suffixed variant.
    ///
    /// # Errors
    ///
    /// `CollisionExhausted` when every suffix up to the limit is taken, or
    /// when the suffixed name would not fit in a file name.
    pub fn resolve(&self, candidate: &Path) -> OrganizeResult<PathBuf> {
        self.resolve_with(candidate, |_| false)
    }

    /// Like [`resolve`](Self::resolve), but also treats every path for which
    /// `reserved` returns true as occupied.
    pub fn resolve_with<F>(&self, candidate: &Path, reserved: F) -> OrganizeResult<PathBuf>
    where
        F: Fn(&Path) -> bool,
    {
        let occupied = |path: &Path| path_occupied(path) || reserved(path);

        if !occupied(candidate) {
            return Ok(candidate.to_path_buf());
        }

        let file_name = candidate
            .file_name()
            .ok_or_else(|| self.exhausted(candidate, 0, "destination has no file name"))?;
        let parent = candidate.parent().unwrap_or_else(|| Path::new(""));

        for n in 1..=self.max_attempts {
            let name = name_with_suffix(file_name, n);
            if name_len(&name) > MAX_FILENAME_LEN {
                return Err(self.exhausted(
                    candidate,
                    n - 1,
                    &format!("suffixed name exceeds {MAX_FILENAME_LEN} bytes"),
                ));
            }

            let variant = parent.join(&name);
            if !occupied(&variant) {
                debug!(
                    candidate = %candidate.display(),
                    resolved = %variant.display(),
                    "destination occupied, using suffixed name"
                );
                return Ok(variant);
            }
            trace!(variant = %variant.display(), "suffixed name also occupied");
        }

        Err(self.exhausted(candidate, self.max_attempts, "every suffix is taken"))
    }

    fn exhausted(&self, candidate: &Path, attempts: u32, reason: &str) -> OrganizeError {
        OrganizeError::CollisionExhausted {
            candidate: candidate.to_path_buf(),
            attempts,
            reason: reason.to_string(),
        }
    }
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COLLISION_ATTEMPTS)
    }
}

/// True if anything, including a dangling symlink, exists at `path`.
pub(crate) fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn name_with_suffix(file_name: &OsStr, n: u32) -> OsString {
    let base = Path::new(file_name);
    let stem = base.file_stem().unwrap_or(file_name);

    let mut name = OsString::from(stem);
    name.push(format!(" ({n})"));
    if let Some(ext) = base.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

#[cfg(unix)]
fn name_len(name: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len(name: &OsStr) -> usize {
    name.to_string_lossy().len()
}
