//! Archive and rotated-copy backups of a directory tree
//!
//! Two mutually exclusive strategies share one pre-walk of the source:
//! - archive: one zip file `<name>_<date>.zip` in the destination
//! - copy: a live mirror `<dest>/<name>`, with the previous mirror moved to
//!   `<dest>/backups/<name>_<date>` first
//!
//! Both are no-ops when the artifact for the day already exists. Neither
//! rolls back partial output on failure.

use crate::error::{ArchiveFailure, BackupError, Result};
use backup_suite_common::{ARCHIVE_EXTENSION, LogSink, ROTATION_DIR_NAME};
use chrono::{Datelike, Local, Timelike};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Result of a successful backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A new archive or mirror was written
    Completed {
        artifact: PathBuf,
        files: usize,
        bytes: u64,
    },
    /// Today's artifact already existed; nothing was touched
    Skipped { existing: PathBuf },
}

impl BackupOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn artifact(&self) -> &Path {
        match self {
            Self::Completed { artifact, .. } => artifact,
            Self::Skipped { existing } => existing,
        }
    }
}

/// One directory or regular file below the source root
#[derive(Debug, Clone, PartialEq, Eq)]
struct TreeEntry {
    relative: PathBuf,
    is_dir: bool,
}

/// Snapshot of the source tree taken before any output is written
#[derive(Debug, Default)]
pub struct SourceTree {
    entries: Vec<TreeEntry>,
    file_count: usize,
}

impl SourceTree {
    /// Walk `root` without following symlinks
    ///
    /// Entries come out parents-first and sorted by name, so repeated runs
    /// visit files in the same order. Anything that is neither a directory
    /// nor a regular file is left out.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut tree = Self::default();

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let file_type = entry.file_type();

            if !file_type.is_dir() && !file_type.is_file() {
                log::debug!("Skipping special file {}", entry.path().display());
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

            if file_type.is_file() {
                tree.file_count += 1;
            }

            tree.entries.push(TreeEntry {
                relative,
                is_dir: file_type.is_dir(),
            });
        }

        Ok(tree)
    }

    /// Number of regular files, the `total` of every progress tick
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.relative.as_path())
    }
}

/// Zip entry name for a source-relative path, always `/`-separated
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Local wall-clock time of `modified` as a zip timestamp
///
/// Zip cannot store times before 1980; such entries keep the format default.
fn zip_timestamp(modified: SystemTime) -> Option<zip::DateTime> {
    let local = chrono::DateTime::<Local>::from(modified).naive_local();

    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        u8::try_from(local.month()).ok()?,
        u8::try_from(local.day()).ok()?,
        u8::try_from(local.hour()).ok()?,
        u8::try_from(local.minute()).ok()?,
        u8::try_from(local.second()).ok()?,
    )
    .ok()
}

/// Copy one file and carry over its modification time and permissions
fn copy_file_preserving_mtime(from: &Path, to: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(from)?;
    let mut input = File::open(from)?;
    let mut output = File::create(to)?;

    let copied = io::copy(&mut input, &mut output)?;
    // Set while the handle is still writable; permissions may drop write access
    output.set_modified(metadata.modified()?)?;
    drop(output);

    fs::set_permissions(to, metadata.permissions())?;
    Ok(copied)
}

/// Executes one backup of `source` into `destination`
pub struct ArchiveEngine<'a> {
    source: &'a Path,
    destination: &'a Path,
    folder_name: &'a str,
    stamp: &'a str,
    sink: &'a LogSink,
}

impl<'a> ArchiveEngine<'a> {
    pub fn new(
        source: &'a Path,
        destination: &'a Path,
        folder_name: &'a str,
        stamp: &'a str,
        sink: &'a LogSink,
    ) -> Self {
        Self {
            source,
            destination,
            folder_name,
            stamp,
            sink,
        }
    }

    /// `<dest>/<name>_<date>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.destination.join(format!(
            "{}_{}.{ARCHIVE_EXTENSION}",
            self.folder_name, self.stamp
        ))
    }

    /// `<dest>/<name>`
    pub fn mirror_path(&self) -> PathBuf {
        self.destination.join(self.folder_name)
    }

    /// `<dest>/backups/<name>_<date>`
    pub fn rotation_path(&self) -> PathBuf {
        self.destination
            .join(ROTATION_DIR_NAME)
            .join(format!("{}_{}", self.folder_name, self.stamp))
    }

    /// Write the whole source tree into a deflate-compressed zip archive
    pub fn write_archive(&self, progress: &mut dyn FnMut(usize, usize)) -> Result<BackupOutcome> {
        let archive_path = self.archive_path();

        if archive_path.exists() {
            self.sink.info(&format!(
                "ZIP archive already exists: {}. Skipping backup.",
                archive_path.display()
            ));
            return Ok(BackupOutcome::Skipped {
                existing: archive_path,
            });
        }

        let tree = SourceTree::scan(self.source)?;
        let total = tree.file_count();

        self.sink
            .info(&format!("Creating ZIP archive: {}", archive_path.display()));

        let fail = |source: ArchiveFailure| {
            self.sink.error(&format!("ZIP backup failed: {source}"));
            BackupError::Archive {
                path: archive_path.clone(),
                source,
            }
        };

        let file = File::create(&archive_path).map_err(|e| fail(e.into()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut processed = 0;
        for relative in tree.files() {
            let name = archive_name(relative);

            let mut input = File::open(self.source.join(relative)).map_err(|e| fail(e.into()))?;
            let metadata = input.metadata().map_err(|e| fail(e.into()))?;

            let mut entry_options = options.large_file(metadata.len() >= u64::from(u32::MAX));
            if let Some(stamp) = metadata.modified().ok().and_then(zip_timestamp) {
                entry_options = entry_options.last_modified_time(stamp);
            }

            zip.start_file(name.as_str(), entry_options)
                .map_err(|e| fail(e.into()))?;
            io::copy(&mut input, &mut zip).map_err(|e| fail(e.into()))?;

            processed += 1;
            self.sink.debug(&format!("Added {name}"));
            progress(processed, total);
        }

        let mut writer = zip.finish().map_err(|e| fail(e.into()))?;
        writer.flush().map_err(|e| fail(e.into()))?;
        drop(writer);

        if total == 0 {
            progress(0, 0);
        }

        let bytes = fs::metadata(&archive_path).map(|m| m.len()).unwrap_or(0);
        self.sink.info("ZIP archive completed.");

        Ok(BackupOutcome::Completed {
            artifact: archive_path,
            files: total,
            bytes,
        })
    }

    /// Rotate the previous mirror into `backups/` and copy the source afresh
    pub fn copy_with_rotation(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<BackupOutcome> {
        let target = self.mirror_path();

        // Walk before touching the destination so a bad source moves nothing
        let tree = SourceTree::scan(self.source)?;
        let total = tree.file_count();

        if target.exists() {
            let rotated = self.rotation_path();

            if rotated.exists() {
                self.sink.info(&format!(
                    "An archive for today already exists: {}. Skipping backup.",
                    rotated.display()
                ));
                return Ok(BackupOutcome::Skipped { existing: rotated });
            }

            self.rotate(&target, &rotated)?;
        }

        self.sink
            .info(&format!("Copying new backup to: {}", target.display()));

        let copy_failed = |path: &Path, source: io::Error| {
            self.sink
                .error(&format!("Backup failed during copy: {source}"));
            BackupError::Copy {
                path: path.to_path_buf(),
                source,
            }
        };

        fs::create_dir_all(&target).map_err(|e| copy_failed(&target, e))?;

        let mut processed = 0;
        let mut bytes = 0;
        for entry in &tree.entries {
            let from = self.source.join(&entry.relative);
            let to = target.join(&entry.relative);

            if entry.is_dir {
                fs::create_dir_all(&to).map_err(|e| copy_failed(&to, e))?;
                continue;
            }

            bytes += copy_file_preserving_mtime(&from, &to).map_err(|e| copy_failed(&from, e))?;
            processed += 1;
            progress(processed, total);
        }

        if total == 0 {
            progress(0, 0);
        }

        self.sink.info("Copy complete.");

        Ok(BackupOutcome::Completed {
            artifact: target,
            files: total,
            bytes,
        })
    }

    /// Move the existing mirror aside; a failed rename leaves it in place
    fn rotate(&self, target: &Path, rotated: &Path) -> Result<()> {
        let rotation_failed = |source: io::Error| {
            self.sink
                .error(&format!("Failed to archive existing backup: {source}"));
            BackupError::Rotation {
                from: target.to_path_buf(),
                to: rotated.to_path_buf(),
                source,
            }
        };

        if let Some(parent) = rotated.parent() {
            fs::create_dir_all(parent).map_err(rotation_failed)?;
        }

        self.sink.info(&format!(
            "Archiving existing backup to: {}",
            rotated.display()
        ));
        fs::rename(target, rotated).map_err(rotation_failed)
    }
}
