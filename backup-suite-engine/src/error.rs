//! Error types for backup jobs and external commands

use backup_suite_common::ValidationError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = BackupError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid backup input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to write archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveFailure,
    },

    #[error("Failed to archive existing backup {} to {}: {source}", from.display(), to.display())]
    Rotation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup job has already been run")]
    AlreadyRun,
}

/// Underlying cause of an archive write failure
#[derive(Error, Debug)]
pub enum ArchiveFailure {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Failure to run an external command to completion
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", timeout.as_secs_f32())]
    TimedOut { program: String, timeout: Duration },
}
