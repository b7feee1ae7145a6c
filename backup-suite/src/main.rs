// Backup Suite command line front end
// Runs dated backups and manages network drive mappings

use anyhow::{Context, Result, bail};
use backup_suite_common::{
    LogSink, SuiteConfig, format_bytes, format_duration, format_progress, is_network_path,
    validate_destination_path, validate_source_path,
};
use backup_suite_engine::{
    BackupJob, BackupOutcome, Credentials, DriveMapper, NetUse, NetworkDrive,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "backup-suite",
    version,
    about = "Dated folder backups with network drive mapping"
)]
struct Cli {
    /// Configuration file (default: <config dir>/backup-suite/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up a folder into a destination, once per day
    Backup {
        /// Folder to back up
        source: PathBuf,
        /// Folder receiving the backup
        destination: PathBuf,
        /// Write a single zip archive instead of a mirrored copy
        #[arg(short, long)]
        compress: bool,
    },

    /// Check that a source and destination are usable
    Check {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Network drive commands
    #[command(subcommand)]
    Drives(DriveCommands),
}

#[derive(Subcommand)]
enum DriveCommands {
    /// List mapped drives
    List {
        /// Print the mappings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Map a drive letter to a share
    Map {
        /// Drive letter, e.g. Z
        letter: String,
        /// Share, e.g. \\NAS\Backups
        unc: String,
        #[arg(short, long)]
        user: Option<String>,
        /// Prompted for when a user is given without one
        #[arg(short, long, requires = "user")]
        password: Option<String>,
    },
    /// Remove a drive mapping
    Unmap { letter: String },
    /// Map a drive again using its current share
    Reconnect {
        letter: String,
        #[arg(short, long)]
        user: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let sink = open_sink(&config);

    match cli.command {
        Commands::Backup {
            source,
            destination,
            compress,
        } => run_backup(&source, &destination, compress, sink),
        Commands::Check {
            source,
            destination,
        } => run_check(&source, &destination, &sink),
        Commands::Drives(command) => {
            let mapper = DriveMapper::new(NetUse::from_config(&config), sink);
            run_drives(command, &mapper)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SuiteConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => SuiteConfig::default_path()?,
    };

    SuiteConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn open_sink(config: &SuiteConfig) -> LogSink {
    match LogSink::open(&config.log_dir) {
        Ok(sink) => sink,
        Err(e) => {
            log::warn!(
                "Cannot open log directory {}: {}; logging to console only",
                config.log_dir.display(),
                e
            );
            LogSink::discard()
        }
    }
}

fn run_backup(source: &Path, destination: &Path, compress: bool, sink: LogSink) -> Result<()> {
    if is_network_path(&destination.to_string_lossy()) {
        log::warn!(
            "Destination {} is a network path; map it to a drive letter for reliable backups",
            destination.display()
        );
    }

    let mut job = BackupJob::new(source, destination, compress, sink)
        .context("Cannot start backup")?;

    let started = Instant::now();
    let mut stderr = std::io::stderr();
    let outcome = job
        .run(|processed, total| {
            let _ = write!(stderr, "\r{}", format_progress(processed, total));
            let _ = stderr.flush();
        })
        .context("Backup failed")?;
    eprintln!();

    match outcome {
        BackupOutcome::Completed {
            artifact,
            files,
            bytes,
        } => println!(
            "Backed up {} files ({}) to {} in {}",
            files,
            format_bytes(bytes),
            artifact.display(),
            format_duration(started.elapsed())
        ),
        BackupOutcome::Skipped { existing } => {
            println!("Backup for today already exists: {}", existing.display())
        }
    }

    Ok(())
}

fn run_check(source: &Path, destination: &Path, sink: &LogSink) -> Result<()> {
    let source_ok = validate_source_path(source);
    let destination_ok = validate_destination_path(destination, sink);

    println!(
        "Source:      {} ({})",
        source.display(),
        if source_ok { "ok" } else { "not a directory" }
    );
    println!(
        "Destination: {} ({})",
        destination.display(),
        if destination_ok { "ok" } else { "not writable" }
    );

    if is_network_path(&destination.to_string_lossy()) {
        println!("Note: destination is a network path without a drive letter");
    }

    if !(source_ok && destination_ok) {
        bail!("Backup paths are not usable");
    }
    Ok(())
}

fn run_drives(command: DriveCommands, mapper: &DriveMapper<NetUse>) -> Result<()> {
    match command {
        DriveCommands::List { json } => {
            let mappings = mapper.list_mapped();
            if json {
                println!("{}", serde_json::to_string_pretty(&mappings)?);
            } else if mappings.is_empty() {
                println!("No mapped drives");
            } else {
                for mapping in &mappings {
                    println!(
                        "{:<14} {:<4} {}",
                        mapping.status.as_str(),
                        mapping.drive,
                        mapping.remote
                    );
                }
            }
            Ok(())
        }
        DriveCommands::Map {
            letter,
            unc,
            user,
            password,
        } => {
            let drive = NetworkDrive::new(&letter, Some(&unc))?;
            let credentials = credentials(user, password)?;
            ensure(mapper.map(&drive, credentials.as_ref()), || {
                format!("Failed to map {drive}")
            })
        }
        DriveCommands::Unmap { letter } => {
            let drive = NetworkDrive::new(&letter, None)?;
            ensure(mapper.unmap(&drive), || {
                format!("Failed to unmap {}", drive.drive_letter().device())
            })
        }
        DriveCommands::Reconnect { letter, user } => {
            let wanted = NetworkDrive::new(&letter, None)?;
            let wanted_letter = wanted.drive_letter().as_char();
            let drive = mapper
                .list_mapped()
                .iter()
                .find(|record| record.letter() == Some(wanted_letter))
                .map(NetworkDrive::from_record)
                .transpose()?
                .unwrap_or(wanted);

            let credentials = credentials(user, None)?;
            ensure(mapper.reconnect(&drive, credentials.as_ref()), || {
                format!("Failed to reconnect {drive}")
            })
        }
    }
}

fn credentials(user: Option<String>, password: Option<String>) -> Result<Option<Credentials>> {
    let Some(user) = user else {
        return Ok(None);
    };

    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for {user}: "))
            .context("Failed to read password")?,
    };

    let credentials = Credentials::new(user, password);
    if !credentials.is_complete() {
        log::warn!("Empty password given; connecting without credentials");
        return Ok(None);
    }

    Ok(Some(credentials))
}

fn ensure(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if !ok {
        bail!(message());
    }
    Ok(())
}
