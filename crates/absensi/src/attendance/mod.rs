//! Attendance engine.
//!
//! The engine is the only writer of attendance records. It enforces one
//! record per (school, student, date, subject) and the scan state machine:
//!
//! - absent to checked in: check-in scan, rejected if any record exists
//! - checked in to checked out: check-out scan on a present record
//! - absent to sick or permission: manual marking, rejected over present
//! - sick or permission to absent: manual clearing deletes the record
//!
//! "Absent" is never stored; it is the absence of a record.

pub mod daily;
pub mod report;
pub mod timeliness;

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, SubsecRound, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::directory::{StudentDirectory, TeacherDirectory};
use crate::error::{Error, Result};
use crate::model::{
    format_date, format_instant, generate_id, AttendanceRecord, AttendanceStatus, ManualStatus,
    ScanMode, Semester,
};
use crate::settings::SettingsStore;
use crate::storage::{row_to_attendance, Storage, ATTENDANCE_COLUMNS};

pub use daily::reduce_daily;
pub use report::{days_in_month, DayMark, MarkTotals, MonthlyReport, ReportRow};
pub use timeliness::{compute_timeliness, local_date, Deadline};

/// A check-in or check-out scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    /// Scanned student.
    pub student_id: String,
    /// Subject, or the whole-school subject.
    pub subject: String,
    /// School the scanner is running for.
    pub school_name: String,
    /// When the scan happened, in the scanner's local offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Direction of the scan.
    pub mode: ScanMode,
    /// Deadline for this session, overriding the engine default.
    pub deadline: Option<Deadline>,
    /// Semester label for the record.
    pub semester: Option<Semester>,
}

impl ScanEvent {
    /// A check-in scan with no overrides.
    #[must_use]
    pub fn check_in(
        student_id: impl Into<String>,
        subject: impl Into<String>,
        school_name: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            subject: subject.into(),
            school_name: school_name.into(),
            timestamp,
            mode: ScanMode::CheckIn,
            deadline: None,
            semester: None,
        }
    }

    /// A check-out scan with no overrides.
    #[must_use]
    pub fn check_out(
        student_id: impl Into<String>,
        subject: impl Into<String>,
        school_name: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            mode: ScanMode::CheckOut,
            ..Self::check_in(student_id, subject, school_name, timestamp)
        }
    }

    /// Use a session-specific deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a semester label.
    #[must_use]
    pub fn with_semester(mut self, semester: Semester) -> Self {
        self.semester = Some(semester);
        self
    }
}

/// Result of a successful scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    /// The record after the scan.
    pub record: AttendanceRecord,
    /// Which transition happened.
    #[serde(rename = "type")]
    pub mode: ScanMode,
}

/// A manual marking request. `status: None` clears the mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualMark {
    /// Student being marked.
    pub student_id: String,
    /// Subject being marked.
    pub subject: String,
    /// School of the student.
    pub school_name: String,
    /// Calendar day being marked.
    pub date: NaiveDate,
    /// New status, or `None` to revert to absent.
    pub status: Option<ManualStatus>,
    /// Semester label for the record.
    pub semester: Option<Semester>,
}

/// Filters for [`AttendanceEngine::get_attendance_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records whose student is currently in this class. Records of
    /// deleted students never match.
    pub class_name: Option<String>,
    /// Only records for this subject.
    pub subject: Option<String>,
    /// Only records in this month (1-12).
    pub month: Option<u32>,
    /// Only records in this year.
    pub year: Option<i32>,
    /// Only records on this day.
    pub date: Option<NaiveDate>,
}

/// Records, queries and reports attendance.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceEngine<'a> {
    storage: &'a Storage,
    deadline: Deadline,
    default_semester: Semester,
}

impl<'a> AttendanceEngine<'a> {
    /// Create an engine with the default deadline and semester.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            deadline: Deadline::default(),
            default_semester: Semester::default(),
        }
    }

    /// Set the on-time deadline used when a scan carries none.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the semester stamped on new records when a request carries none.
    #[must_use]
    pub fn with_default_semester(mut self, semester: Semester) -> Self {
        self.default_semester = semester;
        self
    }

    /// The engine's default deadline.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Apply a check-in or check-out scan.
    ///
    /// # Errors
    ///
    /// - [`Error::AttendanceDisabled`] if the school's attendance flag is off
    /// - [`Error::AlreadyMarked`] if the tuple is marked sick or permission
    /// - [`Error::AlreadyCheckedIn`] on a second check-in
    /// - [`Error::NotCheckedIn`] on a check-out without a check-in
    /// - [`Error::AlreadyCheckedOut`] on a second check-out
    pub fn record_attendance(&self, event: &ScanEvent) -> Result<ScanOutcome> {
        if !SettingsStore::new(self.storage).attendance_enabled(&event.school_name)? {
            return Err(Error::AttendanceDisabled {
                school: event.school_name.clone(),
            });
        }

        let date = local_date(&event.timestamp);
        // Stored instants keep millisecond precision.
        let instant = event.timestamp.with_timezone(&Utc).trunc_subsecs(3);
        let tx = self.storage.conn().unchecked_transaction()?;
        let existing = find_record(
            &tx,
            &event.school_name,
            &event.student_id,
            date,
            &event.subject,
        )?;

        if let Some(existing) = &existing {
            if existing.status.is_manual() {
                return Err(Error::AlreadyMarked {
                    status: existing.status,
                });
            }
        }

        let record = match event.mode {
            ScanMode::CheckIn => {
                if existing.is_some() {
                    return Err(Error::AlreadyCheckedIn);
                }
                let deadline = event.deadline.unwrap_or(self.deadline);
                let record = AttendanceRecord {
                    id: generate_id("att"),
                    student_id: event.student_id.clone(),
                    subject: event.subject.clone(),
                    school_name: event.school_name.clone(),
                    date,
                    status: AttendanceStatus::Present,
                    check_in: Some(instant),
                    check_out: None,
                    timeliness: Some(compute_timeliness(&event.timestamp, deadline)),
                    semester: Some(event.semester.unwrap_or(self.default_semester)),
                };
                insert_record(&tx, &record)?;
                record
            }
            ScanMode::CheckOut => {
                let Some(mut record) = existing else {
                    return Err(Error::NotCheckedIn);
                };
                if record.is_checked_out() {
                    return Err(Error::AlreadyCheckedOut);
                }
                record.check_out = Some(instant);
                if record.semester.is_none() {
                    record.semester = event.semester;
                }
                tx.execute(
                    "UPDATE attendance_records SET check_out = ?2, semester = ?3 WHERE id = ?1",
                    params![
                        record.id,
                        record.check_out.map(format_instant),
                        record.semester.map(Semester::as_str),
                    ],
                )?;
                record
            }
        };
        tx.commit()?;

        info!(
            "Recorded {} for student {} ({}, {}, {})",
            event.mode, record.student_id, record.subject, record.school_name, record.date
        );
        Ok(ScanOutcome {
            record,
            mode: event.mode,
        })
    }

    /// Mark a tuple sick or permission, or clear such a mark.
    ///
    /// Marking over an existing sick or permission record changes its
    /// status in place. Clearing a present record does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PresentRecordLocked`] when marking a tuple that is
    /// already present.
    pub fn set_manual_attendance(&self, mark: &ManualMark) -> Result<()> {
        let tx = self.storage.conn().unchecked_transaction()?;
        let existing = find_record(
            &tx,
            &mark.school_name,
            &mark.student_id,
            mark.date,
            &mark.subject,
        )?;

        match (mark.status, existing) {
            (Some(_), Some(existing)) if existing.status == AttendanceStatus::Present => {
                return Err(Error::PresentRecordLocked);
            }
            (Some(status), Some(existing)) => {
                let semester = mark.semester.unwrap_or(self.default_semester);
                tx.execute(
                    "UPDATE attendance_records SET status = ?2, semester = ?3 WHERE id = ?1",
                    params![
                        existing.id,
                        AttendanceStatus::from(status).as_str(),
                        semester.as_str()
                    ],
                )?;
                debug!("Replaced manual mark on {}", existing.id);
            }
            (Some(status), None) => {
                let record = AttendanceRecord {
                    id: generate_id("att"),
                    student_id: mark.student_id.clone(),
                    subject: mark.subject.clone(),
                    school_name: mark.school_name.clone(),
                    date: mark.date,
                    status: status.into(),
                    check_in: None,
                    check_out: None,
                    timeliness: None,
                    semester: Some(mark.semester.unwrap_or(self.default_semester)),
                };
                insert_record(&tx, &record)?;
            }
            (None, Some(existing)) if existing.status.is_manual() => {
                tx.execute("DELETE FROM attendance_records WHERE id = ?1", [&existing.id])?;
                debug!("Cleared manual mark {}", existing.id);
            }
            (None, Some(existing)) => {
                warn!(
                    "Ignoring clear for present record {} of student {}",
                    existing.id, existing.student_id
                );
            }
            (None, None) => {}
        }
        tx.commit()?;

        info!(
            "Manual attendance for student {} on {} ({}): {}",
            mark.student_id,
            mark.date,
            mark.subject,
            mark.status
                .map_or("cleared", |s| AttendanceStatus::from(s).as_str())
        );
        Ok(())
    }

    /// Records of a school matching every given filter, ordered by date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_attendance_records(
        &self,
        school_name: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>> {
        let columns = ATTENDANCE_COLUMNS
            .split(", ")
            .map(|c| format!("a.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {columns} FROM attendance_records a");
        let mut values: Vec<Value> = Vec::new();

        if let Some(class_name) = &filter.class_name {
            // Inner join: records of deleted students have no class.
            sql.push_str(" JOIN students s ON s.id = a.student_id AND s.class_name = ?");
            values.push(Value::Text(class_name.clone()));
        }

        sql.push_str(" WHERE a.school_name = ?");
        values.push(Value::Text(school_name.to_string()));

        if let Some(subject) = &filter.subject {
            sql.push_str(" AND a.subject = ?");
            values.push(Value::Text(subject.clone()));
        }
        if let Some(month) = filter.month {
            sql.push_str(" AND CAST(substr(a.date, 6, 2) AS INTEGER) = ?");
            values.push(Value::Integer(i64::from(month)));
        }
        if let Some(year) = filter.year {
            sql.push_str(" AND CAST(substr(a.date, 1, 4) AS INTEGER) = ?");
            values.push(Value::Integer(i64::from(year)));
        }
        if let Some(date) = filter.date {
            sql.push_str(" AND a.date = ?");
            values.push(Value::Text(format_date(date)));
        }
        sql.push_str(" ORDER BY a.date, a.check_in, a.rowid");

        let mut stmt = self.storage.conn().prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), row_to_attendance)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Found {} attendance records for {}", records.len(), school_name);
        Ok(records)
    }

    /// One representative record per student for a day across all
    /// subjects. Students without records are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn daily_statuses(
        &self,
        school_name: &str,
        class_name: Option<&str>,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, AttendanceRecord>> {
        let filter = RecordFilter {
            class_name: class_name.map(str::to_string),
            date: Some(date),
            ..RecordFilter::default()
        };
        let records = self.get_attendance_records(school_name, &filter)?;
        Ok(reduce_daily(records))
    }

    /// Monthly recap for a class and subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeriod`] for a month outside 1-12, or an
    /// error if the database operation fails.
    pub fn monthly_report(
        &self,
        school_name: &str,
        class_name: &str,
        subject: &str,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReport> {
        let students = StudentDirectory::new(self.storage).list(school_name, Some(class_name))?;
        let filter = RecordFilter {
            class_name: Some(class_name.to_string()),
            subject: Some(subject.to_string()),
            month: Some(month),
            year: Some(year),
            date: None,
        };
        let records = self.get_attendance_records(school_name, &filter)?;
        let teacher = TeacherDirectory::new(self.storage).find_for(school_name, class_name, subject)?;

        report::build_report(
            report::ReportScope {
                school_name,
                class_name,
                subject,
                year,
                month,
            },
            students,
            &records,
            teacher,
        )
    }
}

fn find_record(
    conn: &Connection,
    school_name: &str,
    student_id: &str,
    date: NaiveDate,
    subject: &str,
) -> Result<Option<AttendanceRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
                 WHERE school_name = ?1 AND student_id = ?2 AND date = ?3 AND subject = ?4"
            ),
            params![school_name, student_id, format_date(date), subject],
            row_to_attendance,
        )
        .optional()?;
    Ok(record)
}

fn insert_record(conn: &Connection, record: &AttendanceRecord) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO attendance_records
            (id, student_id, subject, school_name, date, status,
             check_in, check_out, timeliness, semester)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ",
        params![
            record.id,
            record.student_id,
            record.subject,
            record.school_name,
            format_date(record.date),
            record.status.as_str(),
            record.check_in.map(format_instant),
            record.check_out.map(format_instant),
            record.timeliness.map(|t| t.as_str()),
            record.semester.map(Semester::as_str),
        ],
    )?;
    Ok(())
}
