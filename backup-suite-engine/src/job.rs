//! Backup job orchestration
//!
//! A job validates its inputs once at construction and can be run exactly
//! once. Create a fresh job for every backup.

use crate::archive::{ArchiveEngine, BackupOutcome};
use crate::error::{BackupError, Result};
use backup_suite_common::{
    DATE_FORMAT, LogSink, ValidationError, validate_destination_path, validate_source_path,
};
use chrono::{Local, NaiveDate};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of a backup job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Constructed,
    Running,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct BackupJob {
    source: PathBuf,
    destination: PathBuf,
    folder_name: String,
    compress: bool,
    date: NaiveDate,
    stamp: String,
    state: JobState,
    sink: LogSink,
}

impl BackupJob {
    /// Validate inputs and capture today's date in the local time zone
    pub fn new(
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        compress: bool,
        sink: LogSink,
    ) -> Result<Self> {
        Self::with_date(source, destination, compress, Local::now().date_naive(), sink)
    }

    /// Same as [`BackupJob::new`] with an explicit calendar day
    pub fn with_date(
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        compress: bool,
        date: NaiveDate,
        sink: LogSink,
    ) -> Result<Self> {
        let source = source.as_ref();
        let destination = destination.as_ref();

        if !validate_source_path(source) {
            return Err(ValidationError::new(
                "source",
                format!("Source path is not a valid directory: {}", source.display()),
            )
            .into());
        }

        if !destination.is_dir() {
            return Err(ValidationError::new(
                "destination",
                format!(
                    "Destination path is not a valid directory: {}",
                    destination.display()
                ),
            )
            .into());
        }

        if !validate_destination_path(destination, &sink) {
            return Err(ValidationError::new(
                "destination",
                format!("Destination path not writeable: {}", destination.display()),
            )
            .into());
        }

        let source = absolute(source, "source")?;
        let destination = absolute(destination, "destination")?;
        let folder_name = source_folder_name(&source)?;

        Ok(Self {
            source,
            destination,
            folder_name,
            compress,
            date,
            stamp: date.format(DATE_FORMAT).to_string(),
            state: JobState::Constructed,
            sink,
        })
    }

    /// Run the backup, reporting `(processed, total)` after every file
    ///
    /// Fails with [`BackupError::AlreadyRun`] on any call after the first.
    pub fn run(&mut self, mut progress: impl FnMut(usize, usize)) -> Result<BackupOutcome> {
        if self.state != JobState::Constructed {
            return Err(BackupError::AlreadyRun);
        }

        self.state = JobState::Running;
        self.sink.info(&format!("Starting {self}"));

        let engine = ArchiveEngine::new(
            &self.source,
            &self.destination,
            &self.folder_name,
            &self.stamp,
            &self.sink,
        );

        let result = if self.compress {
            engine.write_archive(&mut progress)
        } else {
            engine.copy_with_rotation(&mut progress)
        };

        match result {
            Ok(outcome) => {
                self.state = JobState::Completed;
                Ok(outcome)
            }
            Err(e) => {
                self.sink.error(&format!("Backup failed: {e}"));
                self.state = JobState::Failed;
                Err(e)
            }
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The day as used in artifact names, `YYYY-MM-DD`
    pub fn timestamp(&self) -> &str {
        &self.stamp
    }

    pub fn state(&self) -> JobState {
        self.state
    }
}

impl fmt::Display for BackupJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackupJob: {} -> {} (compress={})",
            self.source.display(),
            self.destination.display(),
            self.compress
        )
    }
}

fn absolute(path: &Path, field: &str) -> Result<PathBuf, ValidationError> {
    std::path::absolute(path).map_err(|e| {
        ValidationError::new(field, format!("Cannot resolve {}: {e}", path.display()))
    })
}

/// Last component of the source, resolving `..` and similar if needed
fn source_folder_name(source: &Path) -> Result<String, ValidationError> {
    let resolved;
    let path = if source.file_name().is_some() {
        source
    } else {
        resolved = std::fs::canonicalize(source).map_err(|e| {
            ValidationError::new("source", format!("Cannot resolve {}: {e}", source.display()))
        })?;
        resolved.as_path()
    };

    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ValidationError::new(
                "source",
                format!("Source path has no folder name: {}", source.display()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("documents");
        let dest = root.path().join("dest");
        fs::create_dir_all(source.join("letters")).unwrap();
        fs::create_dir(&dest).unwrap();
        fs::write(source.join("todo.txt"), "milk").unwrap();
        fs::write(source.join("letters").join("bank.txt"), "dear bank").unwrap();
        (root, source, dest)
    }

    fn validation_field(err: BackupError) -> String {
        match err {
            BackupError::Validation(e) => e.field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_file_as_source() {
        let (_root, source, dest) = fixture();
        let err = BackupJob::with_date(
            source.join("todo.txt"),
            &dest,
            false,
            date(),
            LogSink::discard(),
        )
        .unwrap_err();

        assert_eq!(validation_field(err), "source");
    }

    #[test]
    fn test_rejects_missing_destination() {
        let (root, source, _dest) = fixture();
        let err = BackupJob::with_date(
            &source,
            root.path().join("missing"),
            false,
            date(),
            LogSink::discard(),
        )
        .unwrap_err();

        assert_eq!(validation_field(err), "destination");
    }

    #[test]
    fn test_captures_timestamp_and_folder_name() {
        let (_root, source, dest) = fixture();
        let job =
            BackupJob::with_date(source.join("."), &dest, true, date(), LogSink::discard())
                .unwrap();

        assert_eq!(job.timestamp(), "2024-05-01");
        assert_eq!(job.folder_name, "documents");
        assert!(job.source().is_absolute());
        assert!(job.destination().is_absolute());
        assert!(job.compress());
        assert_eq!(job.state(), JobState::Constructed);
        assert!(job.to_string().starts_with("BackupJob: "));
        assert!(job.to_string().ends_with("(compress=true)"));
    }

    #[test]
    fn test_run_archive_then_rerun_is_rejected() {
        let (_root, source, dest) = fixture();
        let mut job = BackupJob::with_date(&source, &dest, true, date(), LogSink::discard()).unwrap();

        let mut ticks = Vec::new();
        let outcome = job.run(|done, total| ticks.push((done, total))).unwrap();

        assert_eq!(outcome.artifact(), dest.join("documents_2024-05-01.zip").as_path());
        assert_eq!(ticks, vec![(1, 2), (2, 2)]);
        assert_eq!(job.state(), JobState::Completed);

        assert!(matches!(job.run(|_, _| {}), Err(BackupError::AlreadyRun)));
    }

    #[test]
    fn test_second_job_same_day_is_skipped() {
        let (_root, source, dest) = fixture();

        for expect_skip in [false, true] {
            let mut job =
                BackupJob::with_date(&source, &dest, true, date(), LogSink::discard()).unwrap();
            let outcome = job.run(|_, _| {}).unwrap();
            assert_eq!(outcome.is_skipped(), expect_skip);
            assert_eq!(job.state(), JobState::Completed);
        }

        let archives = fs::read_dir(&dest).unwrap().count();
        assert_eq!(archives, 1);
    }

    #[test]
    fn test_copy_mode_dispatch() {
        let (_root, source, dest) = fixture();
        let mut job = BackupJob::with_date(&source, &dest, false, date(), LogSink::discard()).unwrap();

        let outcome = job.run(|_, _| {}).unwrap();

        assert_eq!(outcome.artifact(), dest.join("documents").as_path());
        assert_eq!(
            fs::read_to_string(dest.join("documents").join("letters").join("bank.txt")).unwrap(),
            "dear bank"
        );
    }

    #[test]
    fn test_failure_marks_job_failed() {
        let (_root, source, dest) = fixture();
        let mut job = BackupJob::with_date(&source, &dest, true, date(), LogSink::discard()).unwrap();

        fs::remove_dir_all(&dest).unwrap();
        let err = job.run(|_, _| {}).unwrap_err();

        assert!(matches!(err, BackupError::Archive { .. }));
        assert_eq!(job.state(), JobState::Failed);
    }
}
