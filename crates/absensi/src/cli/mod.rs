//! Command-line interface for absensi.
//!
//! This module provides the CLI structure for the `absensi` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_timestamp, BackupCommand, ConfigCommand, DailyCommand, MarkCommand, MarkStatusArg,
    RecordsCommand, ReportCommand, ScanCommand, SchoolCommand, SemesterArg, StatusCommand,
    StudentCommand,
};

use crate::logging::Verbosity;

/// absensi - School attendance records
///
/// Records QR check-ins and check-outs, manual sick/permission marks and
/// monthly recaps for one or more schools in a local database.
#[derive(Debug, Parser)]
#[command(name = "absensi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a check-in scan
    CheckIn(ScanCommand),

    /// Record a check-out scan
    CheckOut(ScanCommand),

    /// Mark a student sick or permission, or clear the mark
    Mark(MarkCommand),

    /// Query attendance records
    Records(RecordsCommand),

    /// One status per student for a day, across all subjects
    Daily(DailyCommand),

    /// Monthly recap for a class and subject
    Report(ReportCommand),

    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),

    /// Back up or restore a school's directories
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Manage registered schools
    #[command(subcommand)]
    School(SchoolCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show database status
    Status(StatusCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "absensi");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_check_in() {
        let args = vec![
            "absensi",
            "check-in",
            "student-1",
            "--school",
            "SMA 1",
            "--subject",
            "Matematika",
            "--at",
            "2024-08-01T07:45:00+07:00",
            "--deadline",
            "07:30",
            "--semester",
            "genap",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::CheckIn(cmd) => {
                assert_eq!(cmd.student, "student-1");
                assert_eq!(cmd.school, "SMA 1");
                assert_eq!(cmd.subject, "Matematika");
                assert!(cmd.at.is_some());
                assert_eq!(cmd.deadline.map(|d| d.to_string()).as_deref(), Some("07:30"));
                assert_eq!(cmd.semester, Some(SemesterArg::Genap));
                assert!(!cmd.nis);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_out_defaults_to_school_subject() {
        let args = vec!["absensi", "check-out", "1001", "--nis", "-s", "SMA 1"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::CheckOut(cmd) => {
                assert!(cmd.nis);
                assert_eq!(cmd.subject, crate::model::SCHOOL_ATTENDANCE_SUBJECT);
                assert!(cmd.at.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_in_rejects_bad_deadline() {
        let args = vec!["absensi", "check-in", "s", "-s", "A", "--deadline", "7.30"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_mark() {
        let args = vec![
            "absensi", "mark", "sick", "student-1", "-s", "SMA 1", "--date", "2024-08-01",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Mark(cmd) => {
                assert_eq!(cmd.status, MarkStatusArg::Sick);
                assert_eq!(cmd.date.map(|d| d.to_string()).as_deref(), Some("2024-08-01"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_records_filters() {
        let args = vec![
            "absensi", "records", "-s", "SMA 1", "--class", "X-A", "-m", "8", "-y", "2024", "--json",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Records(cmd) => {
                assert_eq!(cmd.class.as_deref(), Some("X-A"));
                assert_eq!(cmd.month, Some(8));
                assert_eq!(cmd.year, Some(2024));
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_records_rejects_month_13() {
        let args = vec!["absensi", "records", "-s", "SMA 1", "-m", "13"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_backup_restore() {
        let args = vec!["absensi", "backup", "restore", "OLD SCHOOL"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backup(BackupCommand::Restore { ref name }) if name == "OLD SCHOOL"
        ));
    }

    #[test]
    fn test_parse_student_add() {
        let args = vec![
            "absensi", "student", "add", "-s", "SMA 1", "-n", "Budi", "--class", "X-A", "--nis", "1001",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Student(StudentCommand::Add { .. })
        ));
    }

    #[test]
    fn test_parse_school_disable() {
        let args = vec!["absensi", "school", "disable", "SMA 1"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::School(SchoolCommand::Disable { .. })
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let args = vec!["absensi", "-vv", "--config", "/tmp/a.toml", "status", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: true })));
    }

    #[test]
    fn test_parse_config_validate() {
        let args = vec!["absensi", "config", "validate", "--file", "/tmp/x.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }
}
