// Shared types and utilities for Backup Suite

pub mod config;
pub mod format;
pub mod logger;
pub mod validation;

use serde::{Serialize, Serializer};
use std::fmt;

pub use config::SuiteConfig;
pub use format::{format_bytes, format_duration, format_progress};
pub use logger::{LOG_TARGET, LogCallback, LogSink};
pub use validation::{
    ValidationError, is_network_path, validate_destination_path, validate_source_path,
};

/// Name of the folder receiving rotated copies under a destination
pub const ROTATION_DIR_NAME: &str = "backups";

/// Extension of archives written in compressed mode
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Format of the calendar day used in artifact names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single upper-case drive letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriveLetter(char);

impl DriveLetter {
    /// Parse a drive letter, accepting either case
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        validation::validate_drive_letter(value).map(Self)
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Device name as passed to the mapping facility, e.g. `Z:`
    pub fn device(self) -> String {
        format!("{}:", self.0)
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote resource locator of the form `\\host\share[\...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UncPath(String);

impl UncPath {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        validation::validate_unc_path(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection state reported for a mapped drive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriveStatus {
    Ok,
    Disconnected,
    Other(String),
}

impl DriveStatus {
    /// Interpret a status column, ignoring case
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("ok") {
            Self::Ok
        } else if token.eq_ignore_ascii_case("disconnected") {
            Self::Disconnected
        } else {
            Self::Other(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Disconnected => "Disconnected",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DriveStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One entry of a mapped-drive enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedDriveRecord {
    /// Upper-case letter plus separator, e.g. `Z:`
    pub drive: String,
    /// Remote resource, e.g. `\\NAS\Backups`
    pub remote: String,
    pub status: DriveStatus,
}

impl MappedDriveRecord {
    /// The drive letter of this record
    pub fn letter(&self) -> Option<char> {
        self.drive.chars().next()
    }
}
