//! Core record types for absensi.
//!
//! This module defines the records kept by the attendance store: directory
//! entries (students, teachers, operators, school info), attendance records
//! and the small enums that describe their state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Subject used for whole-school (gate) attendance rather than a lesson.
pub const SCHOOL_ATTENDANCE_SUBJECT: &str = "-- Kehadiran Sekolah --";

/// Date format of the calendar-day key on attendance records.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected text.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Stored attendance status. "Alpa" (unexplained absence) is never stored;
/// it is the absence of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Scanned in via QR (or manual check-in).
    Present,
    /// Marked sick by an operator.
    Sick,
    /// Marked as excused absence by an operator.
    Permission,
}

impl AttendanceStatus {
    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Sick => "sick",
            Self::Permission => "permission",
        }
    }

    /// Whether this status was set by manual marking.
    #[must_use]
    pub fn is_manual(self) -> bool {
        matches!(self, Self::Sick | Self::Permission)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "sick" => Ok(Self::Sick),
            "permission" => Ok(Self::Permission),
            other => Err(UnknownVariant::new("attendance status", other)),
        }
    }
}

/// Status an operator can assign by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualStatus {
    /// Sick (S).
    Sick,
    /// Permission (I).
    Permission,
}

impl From<ManualStatus> for AttendanceStatus {
    fn from(status: ManualStatus) -> Self {
        match status {
            ManualStatus::Sick => Self::Sick,
            ManualStatus::Permission => Self::Permission,
        }
    }
}

/// Whether a check-in happened before the daily deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Timeliness {
    /// At or before the deadline.
    OnTime,
    /// Strictly after the deadline.
    Late,
}

impl Timeliness {
    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "on-time",
            Self::Late => "late",
        }
    }
}

impl fmt::Display for Timeliness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeliness {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-time" => Ok(Self::OnTime),
            "late" => Ok(Self::Late),
            other => Err(UnknownVariant::new("timeliness", other)),
        }
    }
}

/// Administrative term label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Semester {
    /// Odd term.
    #[default]
    Ganjil,
    /// Even term.
    Genap,
}

impl Semester {
    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ganjil => "Ganjil",
            Self::Genap => "Genap",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ganjil" => Ok(Self::Ganjil),
            "Genap" => Ok(Self::Genap),
            other => Err(UnknownVariant::new("semester", other)),
        }
    }
}

/// Direction of a scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Arrival.
    CheckIn,
    /// Departure.
    CheckOut,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckIn => write!(f, "check-in"),
            Self::CheckOut => write!(f, "check-out"),
        }
    }
}

/// A student in a school's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Generated identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// School the student belongs to.
    pub school_name: String,
    /// Class identifier, e.g. `XII-A`.
    pub class_name: String,
    /// National student number, unique within the school.
    pub nis: String,
    /// Parent contact number for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
}

/// Fields supplied when adding or editing a student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentInput {
    /// Display name.
    pub name: String,
    /// Class identifier.
    pub class_name: String,
    /// National student number.
    pub nis: String,
    /// Parent contact number.
    pub parent_phone: Option<String>,
}

/// A teacher in a school's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    /// Generated identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Staff number (NIP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip: Option<String>,
    /// Subjects taught.
    pub subjects: Vec<String>,
    /// Classes taught.
    pub classes: Vec<String>,
    /// School the teacher belongs to.
    pub school_name: String,
}

impl Teacher {
    /// Whether this teacher teaches `subject` to `class_name`.
    #[must_use]
    pub fn teaches(&self, class_name: &str, subject: &str) -> bool {
        self.classes.iter().any(|c| c == class_name) && self.subjects.iter().any(|s| s == subject)
    }
}

/// Fields supplied when adding or editing a teacher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherInput {
    /// Display name.
    pub name: String,
    /// Staff number.
    pub nip: Option<String>,
    /// Subjects taught.
    pub subjects: Vec<String>,
    /// Classes taught.
    pub classes: Vec<String>,
}

/// One attendance record for a (school, student, date, subject) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Generated identifier.
    pub id: String,
    /// Weak reference to the student; the student may no longer exist.
    pub student_id: String,
    /// Subject, or [`SCHOOL_ATTENDANCE_SUBJECT`].
    pub subject: String,
    /// School the record belongs to.
    pub school_name: String,
    /// Local calendar day.
    pub date: NaiveDate,
    /// Recorded status.
    pub status: AttendanceStatus,
    /// Check-in instant, set only by a check-in scan.
    pub check_in: Option<DateTime<Utc>>,
    /// Check-out instant.
    pub check_out: Option<DateTime<Utc>>,
    /// Set only at check-in.
    pub timeliness: Option<Timeliness>,
    /// Term label for reporting.
    pub semester: Option<Semester>,
}

impl AttendanceRecord {
    /// The latest instant known for this record: check-out if set, else check-in.
    #[must_use]
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        self.check_out.or(self.check_in)
    }

    /// Whether a check-out has been recorded.
    #[must_use]
    pub fn is_checked_out(&self) -> bool {
        self.check_out.is_some()
    }
}

/// Per-school identity and letterhead details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolInfo {
    /// Registered school name (the record key).
    pub name: String,
    /// Postal address.
    pub address: String,
    /// Headmaster's name.
    pub headmaster: String,
    /// Headmaster's staff number.
    pub headmaster_nip: Option<String>,
    /// Logo as a base64 data URL.
    pub logo_base64: Option<String>,
}

/// An operator account bound to one school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUser {
    /// Generated identifier.
    pub id: String,
    /// Login name, unique per school.
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// School the operator works for.
    pub school_name: String,
}

/// Audit entry written whenever a password changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChangeEntry {
    /// Generated identifier.
    pub id: String,
    /// School of the account whose password changed.
    pub school_name: String,
    /// Username of the account whose password changed.
    pub operator_username: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// Administrator profile fields kept in settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminProfile {
    /// Full name.
    pub full_name: String,
    /// Staff number.
    pub nip: Option<String>,
    /// Contact number.
    pub phone: Option<String>,
}

/// Frozen copy of a school's directories taken before a rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Key of the snapshot: the school name at backup time.
    pub school_name: String,
    /// Students at backup time.
    pub students: Vec<Student>,
    /// Teachers at backup time.
    pub teachers: Vec<Teacher>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Generate a record identifier with the given entity prefix.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Format a date as the stored `YYYY-MM-DD` key.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format an instant the way timestamps are stored (ISO 8601, UTC, millis).
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
