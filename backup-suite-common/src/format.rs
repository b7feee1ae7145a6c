//! Formatting helpers for backup summaries and progress lines

use std::time::Duration;

/// Format bytes as human-readable size using binary units (KiB, MiB, GiB)
///
/// # Examples
/// ```
/// use backup_suite_common::format_bytes;
/// assert_eq!(format_bytes(1536), "1.50 KiB");
/// assert_eq!(format_bytes(1048576), "1.00 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}

/// Format how long a job took, e.g. `850ms`, `42s`, `3m 5s`, `1h 2m`
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();

    if secs == 0 {
        return format!("{}ms", elapsed.subsec_millis());
    }

    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

/// Render a progress tick as `[processed/total] pct%`
///
/// An empty tree (`total == 0`) is reported as complete.
pub fn format_progress(processed: usize, total: usize) -> String {
    let percent = if total == 0 {
        100
    } else {
        processed.min(total) * 100 / total
    };

    format!("[{processed}/{total}] {percent:>3}%")
}
