//! Persistent log of completed moves, the only input undo works from.
//!
//! The manifest is a JSON Lines file: one [`ManifestEntry`] object per line,
//! in the order the moves happened. Appending writes and syncs a single line.
//! Removing entries is only ever done from the tail, by truncating the file at
//! the byte offset where the removed entry starts, so earlier records are never
//! rewritten.
//!
//! A [`Manifest`] handle is scoped to one invocation: it reads every record
//! when loaded, keeps a write handle open while it is alive and releases it on
//! drop. It does not lock the file against other processes.
//!
//! A final line without a newline is what an interrupted append leaves behind.
//! It is dropped if it does not parse and kept if it does. Either way the file
//! itself is only repaired on the next write, so loading never modifies it.

use crate::error::{OrganizeError, OrganizeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Where the file was before the move.
    pub original_path: PathBuf,
    /// Where the file was moved to, after collision resolution.
    pub final_path: PathBuf,
    /// When the move completed.
    pub timestamp: DateTime<Utc>,
    /// Identifier shared by every entry written during one run.
    pub batch: String,
    /// Category the file was sorted into.
    pub category: String,
    /// Set when this move created the category directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_dir: Option<PathBuf>,
}

/// Fix owed to an unterminated final line, applied before the next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailRepair {
    /// Cut the file back to `len`, dropping the partial record.
    Discard,
    /// The record parsed; only its newline is missing.
    Terminate,
}

/// Open handle on the manifest file.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<ManifestEntry>,
    /// Byte offset where each entry's line starts.
    offsets: Vec<u64>,
    /// Number of entries claiming each final path.
    claims: HashMap<PathBuf, usize>,
    len: u64,
    file: Option<File>,
    repair: Option<TailRepair>,
}

impl Manifest {
    /// Reads the manifest at `path`. A missing file is an empty manifest; it is
    /// only created on the first write.
    ///
    /// # Errors
    ///
    /// `ManifestIo` if the file cannot be read, `ManifestCorrupt` with the
    /// 1-based record number and byte offset of the first unparseable line.
    pub fn load(path: impl Into<PathBuf>) -> OrganizeResult<Self> {
        let path = path.into();
        let mut manifest = Self {
            path,
            entries: Vec::new(),
            offsets: Vec::new(),
            claims: HashMap::new(),
            len: 0,
            file: None,
            repair: None,
        };

        let file = match File::open(&manifest.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %manifest.path.display(), "no manifest yet");
                return Ok(manifest);
            }
            Err(e) => return Err(manifest.io_error(e)),
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut offset = 0u64;
        let mut record = 0usize;
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| manifest.io_error(e))?;
            if read == 0 {
                break;
            }
            record += 1;

            let text = line.trim_ascii();
            if text.is_empty() {
                offset += read as u64;
                continue;
            }

            let parsed = serde_json::from_slice::<ManifestEntry>(text);
            if line.last() != Some(&b'\n') {
                match parsed {
                    Ok(entry) => {
                        warn!(record, offset, "final manifest record has no newline");
                        manifest.track(entry, offset);
                        manifest.repair = Some(TailRepair::Terminate);
                        offset += read as u64;
                    }
                    Err(e) => {
                        warn!(
                            record,
                            offset,
                            error = %e,
                            "dropping incomplete final manifest record"
                        );
                        manifest.repair = Some(TailRepair::Discard);
                    }
                }
                break;
            }

            let entry = parsed.map_err(|e| manifest.corrupt(record, offset, &e.to_string()))?;
            manifest.track(entry, offset);
            offset += read as u64;
        }
        manifest.len = offset;

        debug!(
            path = %manifest.path.display(),
            entries = manifest.entries.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in the order they were recorded, oldest first.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if some live entry records `path` as its final location.
    pub fn claims(&self, path: &Path) -> bool {
        self.claims.contains_key(path)
    }

    /// Appends one entry and syncs it to disk.
    ///
    /// On error nothing is recorded in memory and the file is cut back to its
    /// previous length if a partial line may have been written.
    pub fn append(&mut self, entry: ManifestEntry) -> OrganizeResult<()> {
        let mut line = serde_json::to_string(&entry).map_err(|e| {
            self.io_error(std::io::Error::new(ErrorKind::InvalidData, e.to_string()))
        })?;
        line.push('\n');

        // Opening the writer may first repair the tail and move `len`.
        if let Err(e) = self.writer() {
            return Err(self.io_error(e));
        }
        let offset = self.len;
        let written = self.writer().and_then(|file| {
            file.write_all(line.as_bytes())?;
            file.sync_data()
        });
        if let Err(e) = written {
            if let Some(file) = self.file.as_ref() {
                let _ = file.set_len(offset);
            }
            return Err(self.io_error(e));
        }

        trace!(final_path = %entry.final_path.display(), "manifest entry appended");
        self.len = offset + line.len() as u64;
        self.track(entry, offset);
        Ok(())
    }

    /// Removes the most recent entry and returns it.
    pub fn pop(&mut self) -> OrganizeResult<Option<ManifestEntry>> {
        let Some(&offset) = self.offsets.last() else {
            return Ok(None);
        };
        self.truncate_at(offset)?;

        self.offsets.pop();
        let entry = self.entries.pop();
        if let Some(entry) = &entry {
            self.release_claim(&entry.final_path);
        }
        Ok(entry)
    }

    /// Drops every entry.
    pub fn clear(&mut self) -> OrganizeResult<()> {
        if self.len == 0 && self.entries.is_empty() {
            return Ok(());
        }
        self.truncate_at(0)?;
        self.entries.clear();
        self.offsets.clear();
        self.claims.clear();
        Ok(())
    }

    fn truncate_at(&mut self, offset: u64) -> OrganizeResult<()> {
        let result = self.writer().and_then(|file| {
            file.set_len(offset)?;
            file.sync_data()
        });
        result.map_err(|e| self.io_error(e))?;
        self.len = offset;
        Ok(())
    }

    fn writer(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            match self.repair {
                Some(TailRepair::Discard) => file.set_len(self.len)?,
                Some(TailRepair::Terminate) => {
                    file.write_all(b"\n")?;
                    self.len += 1;
                }
                None => {}
            }
            self.repair = None;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("manifest writer unavailable"))
    }

    fn track(&mut self, entry: ManifestEntry, offset: u64) {
        *self.claims.entry(entry.final_path.clone()).or_insert(0) += 1;
        self.offsets.push(offset);
        self.entries.push(entry);
    }

    fn release_claim(&mut self, path: &Path) {
        if let Some(count) = self.claims.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                self.claims.remove(path);
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> OrganizeError {
        OrganizeError::ManifestIo {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, record: usize, offset: u64, reason: &str) -> OrganizeError {
        OrganizeError::ManifestCorrupt {
            path: self.path.clone(),
            record,
            offset,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str, batch: &str) -> ManifestEntry {
        ManifestEntry {
            original_path: PathBuf::from(format!("/data/{name}")),
            final_path: PathBuf::from(format!("/data/docs/{name}")),
            timestamp: Utc::now(),
            batch: batch.to_string(),
            category: "docs".to_string(),
            created_dir: None,
        }
    }

    #[test]
    fn test_missing_manifest_is_empty_and_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("manifest.jsonl");

        let manifest = Manifest::load(&path).unwrap();
        assert!(manifest.is_empty());
        drop(manifest);
        assert!(!path.exists());
    }

    #[test]
    fn test_append_persists_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("manifest.jsonl");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.append(entry("a.pdf", "b1")).unwrap();
        manifest.append(entry("b.pdf", "b1")).unwrap();
        drop(manifest);

        let reloaded = Manifest::load(&path).unwrap();
        let names: Vec<_> = reloaded
            .entries()
            .iter()
            .map(|e| e.original_path.file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert!(reloaded.claims(Path::new("/data/docs/a.pdf")));

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_pop_truncates_tail_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.append(entry("a.pdf", "b1")).unwrap();
        manifest.append(entry("b.pdf", "b2")).unwrap();
        let first_line = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .to_string();

        let popped = manifest.pop().unwrap().unwrap();
        assert_eq!(popped.batch, "b2");
        assert!(!manifest.claims(Path::new("/data/docs/b.pdf")));

        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{first_line}\n"));

        manifest.pop().unwrap();
        assert!(manifest.pop().unwrap().is_none());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_append_after_pop_reuses_offsets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.append(entry("a.pdf", "b1")).unwrap();
        manifest.append(entry("b.pdf", "b1")).unwrap();
        manifest.pop().unwrap();
        manifest.append(entry("c.pdf", "b2")).unwrap();
        drop(manifest);

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[1].batch, "b2");
    }

    #[test]
    fn test_clear_empties_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.append(entry("a.pdf", "b1")).unwrap();
        manifest.clear().unwrap();
        assert!(manifest.is_empty());
        drop(manifest);

        assert!(Manifest::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_record_reports_index_and_offset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        fs::write(&path, format!("{good}\nnot json\n")).unwrap();

        let err = Manifest::load(&path).unwrap_err();
        match err {
            OrganizeError::ManifestCorrupt { record, offset, .. } => {
                assert_eq!(record, 2);
                assert_eq!(offset, good.len() as u64 + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_utf8_record_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        let mut bytes = format!("{good}\n").into_bytes();
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        fs::write(&path, bytes).unwrap();

        let err = Manifest::load(&path).unwrap_err();
        match err {
            OrganizeError::ManifestCorrupt { record, offset, .. } => {
                assert_eq!(record, 2);
                assert_eq!(offset, good.len() as u64 + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interrupted_append_is_dropped_on_next_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        let partial = serde_json::to_string(&entry("b.pdf", "b1")).unwrap();
        let on_disk = format!("{good}\n{}", &partial[..partial.len() / 2]);
        fs::write(&path, &on_disk).unwrap();

        let mut manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries()[0].batch, "b1");
        // Loading alone leaves the file as it was.
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);

        manifest.append(entry("c.pdf", "b2")).unwrap();
        drop(manifest);

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[1].batch, "b2");
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_unterminated_complete_record_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        fs::write(&path, &good).unwrap();

        let mut manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.len(), 1);
        manifest.append(entry("b.pdf", "b2")).unwrap();
        drop(manifest);

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[0].batch, "b1");
        assert_eq!(reloaded.entries()[1].batch, "b2");
    }

    #[test]
    fn test_pop_after_dropped_tail() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        fs::write(&path, format!("{good}\n{{\"original_pa")).unwrap();

        let mut manifest = Manifest::load(&path).unwrap();
        let popped = manifest.pop().unwrap().unwrap();
        assert_eq!(popped.batch, "b1");
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.jsonl");

        let good = serde_json::to_string(&entry("a.pdf", "b1")).unwrap();
        fs::write(&path, format!("\n{good}\n\n")).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.len(), 1);
    }
}
