//! Network drive mapping through an external `net use` style command
//!
//! The command itself sits behind [`DriveFacility`] so the mapper can be
//! driven by a canned facility in tests. Every mapper operation reports
//! success as a `bool` and logs the reason for any failure.

use crate::command::{CommandOutput, run_with_timeout};
use crate::error::CommandError;
use backup_suite_common::{
    DriveLetter, DriveStatus, LogSink, MappedDriveRecord, SuiteConfig, UncPath, ValidationError,
};
use std::collections::HashSet;
use std::fmt;
use std::process::Command;
use std::time::Duration;

/// Account used to authenticate against a share
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Both a user name and a password were given
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A drive letter, optionally bound to the share it should be mapped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkDrive {
    drive_letter: DriveLetter,
    unc_path: Option<UncPath>,
}

impl NetworkDrive {
    pub fn new(drive_letter: &str, unc_path: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            drive_letter: DriveLetter::parse(drive_letter)?,
            unc_path: unc_path.map(UncPath::parse).transpose()?,
        })
    }

    /// Build a drive from an enumerated mapping
    pub fn from_record(record: &MappedDriveRecord) -> Result<Self, ValidationError> {
        let letter = record.letter().map(String::from).unwrap_or_default();
        Self::new(&letter, Some(&record.remote))
    }

    pub fn drive_letter(&self) -> DriveLetter {
        self.drive_letter
    }

    pub fn unc_path(&self) -> Option<&UncPath> {
        self.unc_path.as_ref()
    }
}

impl fmt::Display for NetworkDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unc_path {
            Some(unc) => write!(f, "{}: -> {}", self.drive_letter, unc),
            None => write!(f, "{}: -> [NOT SET]", self.drive_letter),
        }
    }
}

/// Operations on the system's drive mapping table
pub trait DriveFacility {
    fn map(
        &self,
        letter: DriveLetter,
        unc: &UncPath,
        credentials: Option<&Credentials>,
    ) -> Result<CommandOutput, CommandError>;

    fn unmap(&self, letter: DriveLetter) -> Result<CommandOutput, CommandError>;

    /// Raw listing of current mappings, in `net use` layout
    fn list(&self) -> Result<CommandOutput, CommandError>;
}

/// Facility backed by the `net use` command
#[derive(Debug, Clone)]
pub struct NetUse {
    program: String,
    net_timeout: Duration,
    unmap_timeout: Duration,
}

impl Default for NetUse {
    fn default() -> Self {
        Self::from_config(&SuiteConfig::default())
    }
}

impl NetUse {
    pub fn new(program: impl Into<String>, net_timeout: Duration, unmap_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            net_timeout,
            unmap_timeout,
        }
    }

    pub fn from_config(config: &SuiteConfig) -> Self {
        Self::new(
            config.net_command.clone(),
            config.net_timeout(),
            config.unmap_timeout(),
        )
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("use");
        cmd
    }

    fn map_command(
        &self,
        letter: DriveLetter,
        unc: &UncPath,
        credentials: Option<&Credentials>,
    ) -> Command {
        let mut cmd = self.base_command();
        cmd.arg(letter.device()).arg(unc.as_str());
        if let Some(creds) = credentials.filter(|c| c.is_complete()) {
            cmd.arg(creds.password())
                .arg(format!("/user:{}", creds.username()));
        }
        cmd.arg("/persistent:no");
        cmd
    }

    fn unmap_command(&self, letter: DriveLetter) -> Command {
        let mut cmd = self.base_command();
        cmd.arg(letter.device()).args(["/delete", "/y"]);
        cmd
    }
}

impl DriveFacility for NetUse {
    fn map(
        &self,
        letter: DriveLetter,
        unc: &UncPath,
        credentials: Option<&Credentials>,
    ) -> Result<CommandOutput, CommandError> {
        run_with_timeout(
            &mut self.map_command(letter, unc, credentials),
            self.net_timeout,
        )
    }

    fn unmap(&self, letter: DriveLetter) -> Result<CommandOutput, CommandError> {
        run_with_timeout(&mut self.unmap_command(letter), self.unmap_timeout)
    }

    fn list(&self) -> Result<CommandOutput, CommandError> {
        run_with_timeout(&mut self.base_command(), self.net_timeout)
    }
}

/// Maps, unmaps and enumerates network drives, logging every outcome
pub struct DriveMapper<F> {
    facility: F,
    sink: LogSink,
}

impl<F: DriveFacility> DriveMapper<F> {
    pub fn new(facility: F, sink: LogSink) -> Self {
        Self { facility, sink }
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Map `drive` to its share; returns true iff the command succeeded
    pub fn map(&self, drive: &NetworkDrive, credentials: Option<&Credentials>) -> bool {
        let device = drive.drive_letter().device();
        let Some(unc) = drive.unc_path() else {
            self.sink
                .warn(&format!("Cannot map {device}: UNC path not set."));
            return false;
        };

        self.sink.info(&format!("Mapping {device} to {unc}"));
        let result = self.facility.map(drive.drive_letter(), unc, credentials);
        self.report(result, "Mapped successfully.", "Mapping failed")
    }

    pub fn unmap(&self, drive: &NetworkDrive) -> bool {
        self.sink
            .info(&format!("Unmapping {}", drive.drive_letter().device()));
        let result = self.facility.unmap(drive.drive_letter());
        self.report(result, "Unmapped successfully.", "Unmap failed")
    }

    /// Map again using the drive's existing share
    pub fn reconnect(&self, drive: &NetworkDrive, credentials: Option<&Credentials>) -> bool {
        if drive.unc_path().is_none() {
            self.sink.warn("Reconnect failed. UNC path not set.");
            return false;
        }
        self.map(drive, credentials)
    }

    /// Currently mapped drives; empty if the listing could not be obtained
    pub fn list_mapped(&self) -> Vec<MappedDriveRecord> {
        match self.facility.list() {
            Ok(output) => {
                if !output.success {
                    self.sink.warn(&format!(
                        "Drive listing reported failure: {}",
                        output.failure_detail()
                    ));
                }
                parse_mappings(&output.stdout, &self.sink)
            }
            Err(e) => {
                self.sink.error(&format!("Failed to list mapped drives: {e}"));
                Vec::new()
            }
        }
    }

    fn report(
        &self,
        result: Result<CommandOutput, CommandError>,
        success: &str,
        failure: &str,
    ) -> bool {
        match result {
            Ok(output) if output.success => {
                self.sink.info(success);
                true
            }
            Ok(output) => {
                self.sink
                    .error(&format!("{failure}: {}", output.failure_detail()));
                false
            }
            Err(e) => {
                self.sink.error(&format!("{failure}: {e}"));
                false
            }
        }
    }
}

/// Extract drive mappings from `net use` output
///
/// Only lines whose status is `OK` or `Disconnected` are considered. Entries
/// without a drive letter are dropped, and the first entry wins when a letter
/// appears twice.
pub fn parse_mappings(text: &str, sink: &LogSink) -> Vec<MappedDriveRecord> {
    let mut mappings = Vec::new();
    let mut seen = HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        let status = match line.split_whitespace().next() {
            Some(token) => DriveStatus::from_token(token),
            None => continue,
        };
        if matches!(status, DriveStatus::Other(_)) {
            continue;
        }

        let columns = split_columns(line);
        if columns.len() < 3 {
            sink.debug(&format!("Skipping malformed net use line: {line}"));
            continue;
        }

        let drive = columns[1].to_uppercase();
        let Some(letter) = drive_column_letter(&drive) else {
            sink.debug(&format!("Skipping non-drive mapping: {line}"));
            continue;
        };

        if !seen.insert(letter) {
            sink.warn(&format!("Duplicate drive entry found: {drive}"));
            continue;
        }

        mappings.push(MappedDriveRecord {
            drive,
            remote: columns[2].to_string(),
            status,
        });
    }

    mappings
}

/// The letter of a `[A-Z]:` column
fn drive_column_letter(column: &str) -> Option<char> {
    let mut chars = column.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some(':'), None) if letter.is_ascii_uppercase() => Some(letter),
        _ => None,
    }
}

/// Split on runs of two or more whitespace characters
fn split_columns(line: &str) -> Vec<&str> {
    let mut columns = Vec::new();
    let mut start = 0;
    let mut run: Option<(usize, usize)> = None;

    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            let (run_start, len) = run.unwrap_or((i, 0));
            run = Some((run_start, len + 1));
        } else if let Some((run_start, len)) = run.take() {
            if len >= 2 {
                columns.push(&line[start..run_start]);
                start = i;
            }
        }
    }

    let tail = line[start..].trim_end();
    if !tail.is_empty() {
        columns.push(tail);
    }
    columns.retain(|column| !column.is_empty());
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};

    const LISTING: &str = "New connections will not be remembered.\n\
\n\
Status       Local     Remote                    Network\n\
-------------------------------------------------------------------------------\n\
OK    Z:    \\\\NAS\\Backups    Microsoft Windows Network\n\
Disconnected  Y:  \\\\NAS\\Old  Microsoft Windows Network\n\
OK    z:    \\\\OTHER\\Share    Microsoft Windows Network\n\
OK        \\\\NAS\\IPC$    Microsoft Windows Network\n\
The command completed successfully.\n";

    enum Reply {
        Succeed,
        Fail(&'static str),
        Dispatch,
    }

    struct Canned {
        reply: Reply,
        listing: &'static str,
        calls: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                listing: LISTING,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn respond(&self, call: String) -> Result<CommandOutput, CommandError> {
            self.calls.borrow_mut().push(call);
            match self.reply {
                Reply::Succeed => Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    stdout: self.listing.to_string(),
                    stderr: String::new(),
                }),
                Reply::Fail(stderr) => Ok(CommandOutput {
                    success: false,
                    code: Some(2),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }),
                Reply::Dispatch => Err(CommandError::TimedOut {
                    program: "net".to_string(),
                    timeout: Duration::from_secs(10),
                }),
            }
        }
    }

    impl DriveFacility for Canned {
        fn map(
            &self,
            letter: DriveLetter,
            unc: &UncPath,
            credentials: Option<&Credentials>,
        ) -> Result<CommandOutput, CommandError> {
            let user = credentials.map(|c| c.username().to_string());
            self.respond(format!("map {} {} {:?}", letter.device(), unc, user))
        }

        fn unmap(&self, letter: DriveLetter) -> Result<CommandOutput, CommandError> {
            self.respond(format!("unmap {}", letter.device()))
        }

        fn list(&self) -> Result<CommandOutput, CommandError> {
            self.respond("list".to_string())
        }
    }

    fn capture() -> (LogSink, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&lines);
        let sink = LogSink::discard().with_callback(move |msg| {
            writer.lock().unwrap().push(msg.to_string());
        });
        (sink, lines)
    }

    fn nas_drive() -> NetworkDrive {
        NetworkDrive::new("z", Some(r"\\NAS\Backups")).unwrap()
    }

    #[test]
    fn test_parse_mappings_filters_and_deduplicates() {
        let mappings = parse_mappings(LISTING, &LogSink::discard());

        assert_eq!(
            mappings,
            vec![
                MappedDriveRecord {
                    drive: "Z:".to_string(),
                    remote: r"\\NAS\Backups".to_string(),
                    status: DriveStatus::Ok,
                },
                MappedDriveRecord {
                    drive: "Y:".to_string(),
                    remote: r"\\NAS\Old".to_string(),
                    status: DriveStatus::Disconnected,
                },
            ]
        );
    }

    #[test]
    fn test_parse_mappings_warns_on_duplicate() {
        let (sink, lines) = capture();
        parse_mappings(LISTING, &sink);

        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("Duplicate drive entry found: Z:")));
    }

    #[test]
    fn test_parse_mappings_status_is_case_insensitive() {
        let text = "DISCONNECTED   X:   \\\\host\\share   Microsoft Windows Network\n\
                    ok   W:   \\\\host\\other\n\
                    Unavailable   V:   \\\\host\\gone\n";
        let mappings = parse_mappings(text, &LogSink::discard());

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].status, DriveStatus::Disconnected);
        assert_eq!(mappings[1].drive, "W:");
        assert_eq!(mappings[1].remote, r"\\host\other");
    }

    #[test]
    fn test_parse_mappings_skips_malformed_lines() {
        let text = "OK Z: \\\\host\\share\nOK\n";
        assert!(parse_mappings(text, &LogSink::discard()).is_empty());
    }

    #[test]
    fn test_split_columns_keeps_single_spaces() {
        assert_eq!(
            split_columns("OK    Z:    \\\\NAS\\Backups    Microsoft Windows Network"),
            vec!["OK", "Z:", r"\\NAS\Backups", "Microsoft Windows Network"]
        );
        assert_eq!(split_columns("a \tb"), vec!["a", "b"]);
        assert_eq!(split_columns("a b"), vec!["a b"]);
    }

    #[test]
    fn test_network_drive_validation_and_display() {
        let drive = nas_drive();
        assert_eq!(drive.drive_letter().as_char(), 'Z');
        assert_eq!(drive.to_string(), r"Z: -> \\NAS\Backups");

        let bare = NetworkDrive::new("y", None).unwrap();
        assert_eq!(bare.to_string(), "Y: -> [NOT SET]");

        assert!(NetworkDrive::new("zz", None).is_err());
        assert!(NetworkDrive::new("z", Some("NAS/Backups")).is_err());
        assert_eq!(nas_drive(), NetworkDrive::new("Z", Some(r"\\NAS\Backups")).unwrap());
    }

    #[test]
    fn test_network_drive_from_record() {
        let record = MappedDriveRecord {
            drive: "Y:".to_string(),
            remote: r"\\NAS\Old".to_string(),
            status: DriveStatus::Disconnected,
        };
        let drive = NetworkDrive::from_record(&record).unwrap();

        assert_eq!(drive, NetworkDrive::new("Y", Some(r"\\NAS\Old")).unwrap());
    }

    #[test]
    fn test_map_success() {
        let (sink, lines) = capture();
        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), sink);

        assert!(mapper.map(&nas_drive(), None));
        assert_eq!(
            *mapper.facility().calls.borrow(),
            vec![r"map Z: \\NAS\Backups None".to_string()]
        );

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], r"Mapping Z: to \\NAS\Backups");
        assert_eq!(lines[1], "Mapped successfully.");
    }

    #[test]
    fn test_map_failure_logs_stderr() {
        let (sink, lines) = capture();
        let mapper = DriveMapper::new(Canned::new(Reply::Fail("System error 53 has occurred.")), sink);

        assert!(!mapper.map(&nas_drive(), None));
        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l == "Mapping failed: System error 53 has occurred."));
    }

    #[test]
    fn test_dispatch_error_is_failure() {
        let (sink, lines) = capture();
        let mapper = DriveMapper::new(Canned::new(Reply::Dispatch), sink);

        assert!(!mapper.map(&nas_drive(), None));
        assert!(!mapper.unmap(&nas_drive()));
        assert!(mapper.list_mapped().is_empty());

        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.starts_with("Unmap failed: net timed out")));
        assert!(lines.iter().any(|l| l.starts_with("Failed to list mapped drives")));
    }

    #[test]
    fn test_map_without_unc_is_rejected() {
        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), LogSink::discard());
        let bare = NetworkDrive::new("y", None).unwrap();

        assert!(!mapper.map(&bare, None));
        assert!(mapper.facility().calls.borrow().is_empty());
    }

    #[test]
    fn test_unmap_success() {
        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), LogSink::discard());

        assert!(mapper.unmap(&nas_drive()));
        assert_eq!(*mapper.facility().calls.borrow(), vec!["unmap Z:".to_string()]);
    }

    #[test]
    fn test_reconnect_without_unc() {
        let (sink, lines) = capture();
        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), sink);
        let bare = NetworkDrive::new("y", None).unwrap();

        assert!(!mapper.reconnect(&bare, None));
        assert!(mapper.facility().calls.borrow().is_empty());
        assert_eq!(
            *lines.lock().unwrap(),
            vec!["Reconnect failed. UNC path not set.".to_string()]
        );

        assert!(mapper.reconnect(&nas_drive(), None));
        assert_eq!(mapper.facility().calls.borrow().len(), 1);
    }

    #[test]
    fn test_list_mapped_parses_listing() {
        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), LogSink::discard());
        let drives: Vec<_> = mapper.list_mapped().into_iter().map(|r| r.drive).collect();

        assert_eq!(drives, vec!["Z:", "Y:"]);
    }

    #[test]
    fn test_credentials_never_logged() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path()).unwrap();
        let log_file = sink.file_path().unwrap().to_path_buf();
        let creds = Credentials::new("backup", "hunter2-secret");

        let mapper = DriveMapper::new(Canned::new(Reply::Fail("Access is denied.")), sink.clone());
        assert!(!mapper.map(&nas_drive(), Some(&creds)));

        let mapper = DriveMapper::new(Canned::new(Reply::Succeed), sink);
        assert!(mapper.reconnect(&nas_drive(), Some(&creds)));

        let logged = std::fs::read_to_string(log_file).unwrap();
        assert!(logged.contains("Mapping Z:"));
        assert!(!logged.contains("hunter2-secret"));
        assert!(!format!("{creds:?}").contains("hunter2-secret"));
    }

    #[test]
    fn test_net_use_arguments() {
        let net = NetUse::new("net", Duration::from_secs(10), Duration::from_secs(5));
        let letter = DriveLetter::parse("z").unwrap();
        let unc = UncPath::parse(r"\\NAS\Backups").unwrap();
        let creds = Credentials::new("backup", "pw");

        let args = |cmd: Command| -> Vec<String> {
            cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
        };

        assert_eq!(
            args(net.map_command(letter, &unc, None)),
            vec!["use", "Z:", r"\\NAS\Backups", "/persistent:no"]
        );
        assert_eq!(
            args(net.map_command(letter, &unc, Some(&creds))),
            vec!["use", "Z:", r"\\NAS\Backups", "pw", "/user:backup", "/persistent:no"]
        );
        assert_eq!(
            args(net.map_command(letter, &unc, Some(&Credentials::new("backup", "")))),
            vec!["use", "Z:", r"\\NAS\Backups", "/persistent:no"]
        );
        assert_eq!(args(net.unmap_command(letter)), vec!["use", "Z:", "/delete", "/y"]);
        assert_eq!(args(net.base_command()), vec!["use"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_net_use_with_missing_program() {
        let net = NetUse::new(
            "definitely-not-a-real-program-4711",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let mapper = DriveMapper::new(net, LogSink::discard());

        assert!(mapper.list_mapped().is_empty());
        assert!(!mapper.unmap(&nas_drive()));
    }
}
