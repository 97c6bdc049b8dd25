//! Monthly recap grid for one class and subject.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, Student, Teacher, Timeliness};

/// What a single report cell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayMark {
    /// No school.
    Sunday,
    /// Present and checked out.
    CheckedOut,
    /// Present, on time, not checked out.
    CheckedIn,
    /// Present but checked in after the deadline.
    Late,
    /// Sick.
    Sick,
    /// Permission.
    Permission,
    /// No record.
    Absent,
}

impl DayMark {
    /// Classify a day. Sundays win over any record.
    #[must_use]
    pub fn for_day(date: NaiveDate, record: Option<&AttendanceRecord>) -> Self {
        if date.weekday() == Weekday::Sun {
            return Self::Sunday;
        }
        let Some(record) = record else {
            return Self::Absent;
        };
        match record.status {
            AttendanceStatus::Sick => Self::Sick,
            AttendanceStatus::Permission => Self::Permission,
            AttendanceStatus::Present if record.timeliness == Some(Timeliness::Late) => Self::Late,
            AttendanceStatus::Present if record.is_checked_out() => Self::CheckedOut,
            AttendanceStatus::Present => Self::CheckedIn,
        }
    }

    /// One-character symbol used on the printed recap.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Sunday => "-",
            Self::CheckedOut => "✓",
            Self::CheckedIn => "M",
            Self::Late => "T",
            Self::Sick => "S",
            Self::Permission => "I",
            Self::Absent => "A",
        }
    }
}

impl fmt::Display for DayMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Per-student counts over school days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkTotals {
    /// Days present, late ones included.
    pub present: u32,
    /// Days present but late.
    pub late: u32,
    /// Days sick.
    pub sick: u32,
    /// Days with permission.
    pub permission: u32,
    /// Days without any record.
    pub absent: u32,
}

impl MarkTotals {
    fn add(&mut self, mark: DayMark) {
        match mark {
            DayMark::Sunday => {}
            DayMark::CheckedOut | DayMark::CheckedIn => self.present += 1,
            DayMark::Late => {
                self.present += 1;
                self.late += 1;
            }
            DayMark::Sick => self.sick += 1,
            DayMark::Permission => self.permission += 1,
            DayMark::Absent => self.absent += 1,
        }
    }
}

/// One student's line of the recap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// The student.
    pub student: Student,
    /// One mark per day of the month, starting at day 1.
    pub marks: Vec<DayMark>,
    /// Totals over the marks.
    pub totals: MarkTotals,
}

/// Monthly recap of one class and subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    /// School the report covers.
    pub school_name: String,
    /// Class the report covers.
    pub class_name: String,
    /// Subject the report covers.
    pub subject: String,
    /// Year of the period.
    pub year: i32,
    /// Month of the period (1-12).
    pub month: u32,
    /// Teacher of the subject for the class, if any.
    pub teacher: Option<Teacher>,
    /// One row per student, sorted by name.
    pub rows: Vec<ReportRow>,
}

impl MonthlyReport {
    /// Number of day columns.
    #[must_use]
    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month).unwrap_or(0)
    }
}

/// Number of days in a month, or `None` for an invalid month.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Scope of a report.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportScope<'s> {
    pub school_name: &'s str,
    pub class_name: &'s str,
    pub subject: &'s str,
    pub year: i32,
    pub month: u32,
}

/// Build the grid from a class's students and the month's records.
///
/// Records for students outside `students` are ignored. When several
/// records share a student and day the first one is used.
pub(crate) fn build_report(
    scope: ReportScope<'_>,
    students: Vec<Student>,
    records: &[AttendanceRecord],
    teacher: Option<Teacher>,
) -> Result<MonthlyReport> {
    let days = days_in_month(scope.year, scope.month).ok_or(Error::InvalidPeriod {
        year: scope.year,
        month: scope.month,
    })?;

    let mut by_key: HashMap<(&str, NaiveDate), &AttendanceRecord> = HashMap::new();
    for record in records {
        by_key
            .entry((record.student_id.as_str(), record.date))
            .or_insert(record);
    }

    let rows = students
        .into_iter()
        .map(|student| {
            let mut totals = MarkTotals::default();
            let marks = (1..=days)
                .filter_map(|day| NaiveDate::from_ymd_opt(scope.year, scope.month, day))
                .map(|date| {
                    let record = by_key.get(&(student.id.as_str(), date)).copied();
                    let mark = DayMark::for_day(date, record);
                    totals.add(mark);
                    mark
                })
                .collect();
            ReportRow {
                student,
                marks,
                totals,
            }
        })
        .collect();

    Ok(MonthlyReport {
        school_name: scope.school_name.to_string(),
        class_name: scope.class_name.to_string(),
        subject: scope.subject.to_string(),
        year: scope.year,
        month: scope.month,
        teacher,
        rows,
    })
}
