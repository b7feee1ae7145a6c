// Backup and network drive engine for Backup Suite

pub mod archive;
pub mod command;
pub mod drive;
pub mod error;
pub mod job;

pub use archive::BackupOutcome;
pub use command::{CommandOutput, run_with_timeout};
pub use drive::{
    Credentials, DriveFacility, DriveMapper, NetUse, NetworkDrive, parse_mappings,
};
pub use error::{ArchiveFailure, BackupError, CommandError, Result};
pub use job::{BackupJob, JobState};
