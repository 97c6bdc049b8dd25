//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use clap::{Args, Subcommand, ValueEnum};

use crate::attendance::Deadline;
use crate::model::{ManualStatus, Semester, SCHOOL_ATTENDANCE_SUBJECT};

/// Parse a scan timestamp: RFC 3339, or `YYYY-MM-DD HH:MM[:SS]` in the
/// local timezone.
///
/// # Errors
///
/// Returns a message if the value matches neither form.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt);
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .map_err(|_| format!("invalid timestamp '{value}': expected RFC 3339 or 'YYYY-MM-DD HH:MM'"))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("timestamp '{value}' does not exist in the local timezone"))
}

fn parse_deadline(value: &str) -> Result<Deadline, String> {
    Deadline::parse(value).map_err(|e| e.to_string())
}

/// Semester argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SemesterArg {
    /// Odd term
    Ganjil,
    /// Even term
    Genap,
}

impl From<SemesterArg> for Semester {
    fn from(arg: SemesterArg) -> Self {
        match arg {
            SemesterArg::Ganjil => Self::Ganjil,
            SemesterArg::Genap => Self::Genap,
        }
    }
}

/// Manual status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkStatusArg {
    /// Mark as sick
    Sick,
    /// Mark as permission
    Permission,
    /// Remove a sick or permission mark
    Clear,
}

impl From<MarkStatusArg> for Option<ManualStatus> {
    fn from(arg: MarkStatusArg) -> Self {
        match arg {
            MarkStatusArg::Sick => Some(ManualStatus::Sick),
            MarkStatusArg::Permission => Some(ManualStatus::Permission),
            MarkStatusArg::Clear => None,
        }
    }
}

/// Arguments shared by check-in and check-out.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Student id (or NIS with --nis)
    pub student: String,

    /// Treat the student argument as a NIS
    #[arg(long)]
    pub nis: bool,

    /// School name
    #[arg(short, long)]
    pub school: String,

    /// Subject (defaults to whole-school attendance)
    #[arg(long, default_value = SCHOOL_ATTENDANCE_SUBJECT)]
    pub subject: String,

    /// Scan time (defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<DateTime<FixedOffset>>,

    /// On-time deadline for this session, HH:MM
    #[arg(long, value_parser = parse_deadline)]
    pub deadline: Option<Deadline>,

    /// Semester label
    #[arg(long, value_enum)]
    pub semester: Option<SemesterArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Manual marking arguments.
#[derive(Debug, Args)]
pub struct MarkCommand {
    /// New status
    #[arg(value_enum)]
    pub status: MarkStatusArg,

    /// Student id (or NIS with --nis)
    pub student: String,

    /// Treat the student argument as a NIS
    #[arg(long)]
    pub nis: bool,

    /// School name
    #[arg(short, long)]
    pub school: String,

    /// Subject (defaults to whole-school attendance)
    #[arg(long, default_value = SCHOOL_ATTENDANCE_SUBJECT)]
    pub subject: String,

    /// Day to mark, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Semester label
    #[arg(long, value_enum)]
    pub semester: Option<SemesterArg>,
}

/// Attendance query arguments.
#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// School name
    #[arg(short, long)]
    pub school: String,

    /// Only students currently in this class
    #[arg(long)]
    pub class: Option<String>,

    /// Only this subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Only this month (1-12)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Only this year
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Daily "all subjects" view arguments.
#[derive(Debug, Args)]
pub struct DailyCommand {
    /// School name
    #[arg(short, long)]
    pub school: String,

    /// Only this class
    #[arg(long)]
    pub class: Option<String>,

    /// Day to show, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Monthly report arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// School name
    #[arg(short, long)]
    pub school: String,

    /// Class
    #[arg(long)]
    pub class: String,

    /// Subject (defaults to whole-school attendance)
    #[arg(long, default_value = SCHOOL_ATTENDANCE_SUBJECT)]
    pub subject: String,

    /// Year (defaults to the current year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Month, 1-12 (defaults to the current month)
    #[arg(short, long)]
    pub month: Option<u32>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Student directory commands.
#[derive(Debug, Subcommand)]
pub enum StudentCommand {
    /// Add a student
    Add {
        /// School name
        #[arg(short, long)]
        school: String,

        /// Student name
        #[arg(short, long)]
        name: String,

        /// Class
        #[arg(long)]
        class: String,

        /// National student number
        #[arg(long)]
        nis: String,

        /// Parent phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// List students
    List {
        /// School name
        #[arg(short, long)]
        school: String,

        /// Only this class
        #[arg(long)]
        class: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete a student (attendance records are kept)
    Delete {
        /// Student id
        id: String,
    },
}

/// Backup commands.
#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Back up a school's students and teachers, then clear them
    Create {
        /// Current school name
        school: String,
    },

    /// Check whether a backup exists
    Check {
        /// School name the backup was taken under
        name: String,
    },

    /// Restore and consume a backup
    Restore {
        /// School name the backup was taken under
        name: String,
    },

    /// List stored backups
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// School registry commands.
#[derive(Debug, Subcommand)]
pub enum SchoolCommand {
    /// Register a school name
    Register {
        /// School name
        name: String,
    },

    /// List registered schools
    List,

    /// Enable QR attendance for a school
    Enable {
        /// School name
        name: String,
    },

    /// Disable QR attendance for a school
    Disable {
        /// School name
        name: String,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
