//! Input validation utilities
//!
//! Pure shape checks for drive letters and UNC paths, plus the filesystem
//! probes used before a backup job is allowed to start.

use crate::logger::LogSink;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a drive letter
///
/// Accepts exactly one ASCII letter (surrounding whitespace ignored) and
/// returns it upper-cased.
///
/// # Examples
/// ```
/// # use backup_suite_common::validation::validate_drive_letter;
/// assert_eq!(validate_drive_letter("z").unwrap(), 'Z');
/// assert!(validate_drive_letter("AB").is_err());
/// assert!(validate_drive_letter("1").is_err());
/// ```
pub fn validate_drive_letter(value: &str) -> Result<char, ValidationError> {
    let mut chars = value.trim().chars();

    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ValidationError::new(
            "drive_letter",
            format!("Invalid drive letter: '{value}'. Must be a single letter."),
        )),
    }
}

/// Validate a UNC path of the form `\\host\share[\...]`
///
/// Returns the trimmed path on success.
pub fn validate_unc_path(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let invalid = || ValidationError::new("unc_path", format!("Invalid UNC path: '{value}'"));

    let rest = trimmed.strip_prefix(r"\\").ok_or_else(invalid)?;
    let (host, tail) = rest.split_once('\\').ok_or_else(invalid)?;
    let share = tail.split('\\').next().unwrap_or_default();

    if host.is_empty() || share.is_empty() {
        return Err(invalid());
    }

    Ok(trimmed.to_string())
}

/// Check whether a path refers to a network location (`\\host\...`)
///
/// Forward slashes are treated as separators, so `//nas/share` also counts.
pub fn is_network_path(path: &str) -> bool {
    path.replace('/', "\\").starts_with(r"\\")
}

/// Check that a backup source exists and is a directory
pub fn validate_source_path(path: &Path) -> bool {
    path.is_dir()
}

/// Probe whether a destination directory accepts writes
///
/// Creates a uniquely named marker file inside `path`, writes to it and
/// removes it again. Permission problems, unreachable shares and full disks
/// all show up as `false`. A marker that cannot be removed is logged but
/// does not change the result.
pub fn validate_destination_path(path: &Path, sink: &LogSink) -> bool {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let marker = path.join(format!("__write_probe_{}_{nanos}.tmp", std::process::id()));

    probe_with_marker(path, &marker, sink)
}

/// Create `marker`, write to it and remove it again
///
/// Only a marker this call created is ever removed.
fn probe_with_marker(path: &Path, marker: &Path, sink: &LogSink) -> bool {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(marker) {
        Ok(file) => file,
        Err(e) => {
            sink.debug(&format!(
                "Destination {} is not writable: {e}",
                path.display()
            ));
            return false;
        }
    };

    let written = file.write_all(b"probe");
    drop(file);
    let removed = std::fs::remove_file(marker);

    if let Err(e) = written {
        sink.debug(&format!(
            "Destination {} is not writable: {e}",
            path.display()
        ));
        return false;
    }

    if let Err(e) = removed {
        sink.warn(&format!(
            "Failed to remove write probe {}: {e}",
            marker.display()
        ));
    }

    true
}
