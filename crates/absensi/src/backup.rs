//! Directory backups taken when a school is renamed.
//!
//! `backup_and_reset` freezes a school's students and teachers under its
//! old name and clears them; `restore` puts them back and consumes the
//! snapshot. Attendance records are neither backed up nor cleared.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use crate::directory::students::insert_student;
use crate::directory::teachers::insert_teacher;
use crate::error::Result;
use crate::model::{format_instant, BackupSnapshot, Student, Teacher};
use crate::storage::{row_to_student, row_to_teacher, Storage, STUDENT_COLUMNS, TEACHER_COLUMNS};

/// Rows belonging to a school, including legacy rows never stamped with one.
const SCHOOL_SCOPE: &str = "school_name = ?1 OR school_name IS NULL";

/// Summary of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    /// Key of the snapshot.
    pub school_name: String,
    /// When it was taken.
    pub created_at: DateTime<Utc>,
    /// Students in the snapshot.
    pub students: usize,
    /// Teachers in the snapshot.
    pub teachers: usize,
}

/// Creates, inspects and restores directory snapshots.
#[derive(Debug, Clone, Copy)]
pub struct BackupManager<'a> {
    storage: &'a Storage,
}

impl<'a> BackupManager<'a> {
    /// Create a backup manager over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Snapshot the school's students and teachers under `old_school_name`,
    /// replacing any previous snapshot with that key, then clear them.
    ///
    /// Both steps run in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is changed
    /// in that case.
    pub fn backup_and_reset(&self, old_school_name: &str) -> Result<BackupInfo> {
        let tx = self.storage.conn().unchecked_transaction()?;

        let snapshot = BackupSnapshot {
            school_name: old_school_name.to_string(),
            students: load_students(&tx, old_school_name)?,
            teachers: load_teachers(&tx, old_school_name)?,
            created_at: Utc::now().trunc_subsecs(3),
        };

        tx.execute(
            r"
            INSERT OR REPLACE INTO data_backups (school_name, snapshot, created_at)
            VALUES (?1, ?2, ?3)
            ",
            params![
                snapshot.school_name,
                serde_json::to_string(&snapshot)?,
                format_instant(snapshot.created_at),
            ],
        )?;
        tx.execute(
            &format!("DELETE FROM students WHERE {SCHOOL_SCOPE}"),
            [old_school_name],
        )?;
        tx.execute(
            &format!("DELETE FROM teachers WHERE {SCHOOL_SCOPE}"),
            [old_school_name],
        )?;
        tx.commit()?;

        info!(
            "Backed up and cleared {} students and {} teachers of '{}'",
            snapshot.students.len(),
            snapshot.teachers.len(),
            old_school_name
        );
        Ok(BackupInfo::from(&snapshot))
    }

    /// Whether a snapshot exists under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn check_for_backup(&self, name: &str) -> Result<bool> {
        let exists: bool = self.storage.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM data_backups WHERE school_name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Replace the school's students and teachers with the snapshot under
    /// `name` and delete the snapshot. Returns `false` without changing
    /// anything if there is no snapshot.
    ///
    /// Restored rows belong to `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is changed
    /// in that case.
    pub fn restore(&self, name: &str) -> Result<bool> {
        let tx = self.storage.conn().unchecked_transaction()?;

        let Some(snapshot) = load_snapshot(&tx, name)? else {
            warn!("No backup found for '{}'; nothing to restore", name);
            return Ok(false);
        };

        tx.execute(&format!("DELETE FROM students WHERE {SCHOOL_SCOPE}"), [name])?;
        tx.execute(&format!("DELETE FROM teachers WHERE {SCHOOL_SCOPE}"), [name])?;

        for student in &snapshot.students {
            insert_student(
                &tx,
                &Student {
                    school_name: name.to_string(),
                    ..student.clone()
                },
            )?;
        }
        for teacher in &snapshot.teachers {
            insert_teacher(
                &tx,
                &Teacher {
                    school_name: name.to_string(),
                    ..teacher.clone()
                },
            )?;
        }

        tx.execute("DELETE FROM data_backups WHERE school_name = ?1", [name])?;
        tx.commit()?;

        info!(
            "Restored {} students and {} teachers for '{}'",
            snapshot.students.len(),
            snapshot.teachers.len(),
            name
        );
        Ok(true)
    }

    /// All stored snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a snapshot
    /// cannot be decoded.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut stmt = self
            .storage
            .conn()
            .prepare("SELECT snapshot FROM data_backups ORDER BY created_at, school_name")?;

        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.iter()
            .map(|json| -> Result<BackupInfo> {
                let snapshot: BackupSnapshot = serde_json::from_str(json)?;
                Ok(BackupInfo::from(&snapshot))
            })
            .collect()
    }
}

impl From<&BackupSnapshot> for BackupInfo {
    fn from(snapshot: &BackupSnapshot) -> Self {
        Self {
            school_name: snapshot.school_name.clone(),
            created_at: snapshot.created_at,
            students: snapshot.students.len(),
            teachers: snapshot.teachers.len(),
        }
    }
}

fn load_snapshot(conn: &Connection, name: &str) -> Result<Option<BackupSnapshot>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT snapshot FROM data_backups WHERE school_name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
}

fn load_students(conn: &Connection, school_name: &str) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE {SCHOOL_SCOPE} ORDER BY rowid"
    ))?;
    let students = stmt
        .query_map([school_name], row_to_student)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(students)
}

fn load_teachers(conn: &Connection, school_name: &str) -> Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEACHER_COLUMNS} FROM teachers WHERE {SCHOOL_SCOPE} ORDER BY rowid"
    ))?;
    let teachers = stmt
        .query_map([school_name], row_to_teacher)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(teachers)
}
