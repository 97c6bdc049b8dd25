//! Storage layer for absensi.
//!
//! This module provides the `SQLite`-backed [`Storage`] handle. It is opened
//! once at startup and borrowed by every component (settings, directories,
//! the attendance engine, backups); there is no process-wide connection.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Student, Teacher, DATE_FORMAT};
use crate::settings;

/// Column list matching [`row_to_student`].
pub(crate) const STUDENT_COLUMNS: &str = "id, name, school_name, class_name, nis, parent_phone";

/// Column list matching [`row_to_teacher`].
pub(crate) const TEACHER_COLUMNS: &str = "id, name, nip, subjects, classes, school_name";

/// Column list matching [`row_to_attendance`].
pub(crate) const ATTENDANCE_COLUMNS: &str =
    "id, student_id, subject, school_name, date, status, check_in, check_out, timeliness, semester";

/// Options applied when opening a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOptions {
    /// School used to stamp legacy records when the legacy school info
    /// record is missing.
    pub legacy_school_name: Option<String>,
}

/// Handle to the attendance database.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// then brings the schema to the current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails. The caller must treat this as fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &StorageOptions::default())
    }

    /// Open or create a storage database with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open_with(path: impl AsRef<Path>, options: &StorageOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|source| Error::DatabaseOpen {
                path: path.clone(),
                source,
            })?;

        let storage = Self::initialize(path, conn, options)?;
        info!("Database opened successfully at {}", storage.path.display());
        Ok(storage)
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Self::initialize(PathBuf::from(":memory:"), conn, &StorageOptions::default())
    }

    fn initialize(path: PathBuf, mut conn: Connection, options: &StorageOptions) -> Result<Self> {
        migrations::initialize_schema(&mut conn, options.legacy_school_name.as_deref())?;
        settings::seed_defaults(&conn)?;
        Ok(Self { path, conn })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying connection, for components in this crate.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        // Get database file size
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            schema_version: migrations::get_schema_version(&self.conn)?,
            students: count("students")?,
            teachers: count("teachers")?,
            attendance_records: count("attendance_records")?,
            operators: count("operator_users")?,
            backups: count("data_backups")?,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Schema version of the open file.
    pub schema_version: i32,
    /// Students across all schools.
    pub students: i64,
    /// Teachers across all schools.
    pub teachers: i64,
    /// Attendance records across all schools.
    pub attendance_records: i64,
    /// Operator accounts.
    pub operators: i64,
    /// Directory backup snapshots.
    pub backups: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

pub(crate) fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_instant(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion_error(idx, e))
        })
        .transpose()
}

fn parse_json_list(idx: usize, value: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(value).map_err(|e| conversion_error(idx, e))
}

/// Convert a database row to a Student struct.
pub(crate) fn row_to_student(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        school_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        class_name: row.get(3)?,
        nis: row.get(4)?,
        parent_phone: row.get(5)?,
    })
}

/// Convert a database row to a Teacher struct.
pub(crate) fn row_to_teacher(row: &Row) -> rusqlite::Result<Teacher> {
    let subjects: String = row.get(3)?;
    let classes: String = row.get(4)?;
    Ok(Teacher {
        id: row.get(0)?,
        name: row.get(1)?,
        nip: row.get(2)?,
        subjects: parse_json_list(3, &subjects)?,
        classes: parse_json_list(4, &classes)?,
        school_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

/// Convert a database row to an AttendanceRecord struct.
pub(crate) fn row_to_attendance(row: &Row) -> rusqlite::Result<AttendanceRecord> {
    let date: String = row.get(4)?;
    let status: String = row.get(5)?;
    let timeliness: Option<String> = row.get(8)?;
    let semester: Option<String> = row.get(9)?;

    Ok(AttendanceRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject: row.get(2)?,
        school_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| conversion_error(4, e))?,
        status: status.parse().map_err(|e| conversion_error(5, e))?,
        check_in: parse_instant(6, row.get(6)?)?,
        check_out: parse_instant(7, row.get(7)?)?,
        timeliness: timeliness
            .map(|t| t.parse())
            .transpose()
            .map_err(|e| conversion_error(8, e))?,
        semester: semester
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| conversion_error(9, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("absensi_{tag}_{}.db", std::process::id()))
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_path() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_stats_empty() {
        let storage = Storage::open_in_memory().unwrap();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.schema_version, migrations::CURRENT_VERSION);
        assert_eq!(stats.students, 0);
        assert_eq!(stats.attendance_records, 0);
        assert_eq!(stats.backups, 0);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_based() {
        let db_path = temp_db_path("open");
        cleanup(&db_path);

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.path(), db_path);
        assert!(storage.stats().unwrap().db_size_bytes > 0);

        drop(storage);
        // Reopening an up-to-date file is a no-op upgrade.
        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(
            storage.stats().unwrap().schema_version,
            migrations::CURRENT_VERSION
        );

        drop(storage);
        cleanup(&db_path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "absensi_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }

    #[test]
    fn test_open_unwritable_location_is_fatal() {
        let err = Storage::open("/proc/absensi-cannot-exist/db.sqlite").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_row_to_attendance_rejects_unknown_status() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO attendance_records (id, student_id, subject, school_name, date, status)
                 VALUES ('att-x', 'student-1', 'Matematika', 'SMA 1', '2024-08-01', 'alpa')",
                [],
            )
            .unwrap();

        let result = storage.conn().query_row(
            &format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance_records"),
            [],
            row_to_attendance,
        );
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(5, _, _))
        ));
    }

    #[test]
    fn test_storage_stats_clone() {
        let stats = StorageStats {
            schema_version: 2,
            students: 5,
            teachers: 1,
            attendance_records: 10,
            operators: 1,
            backups: 0,
            db_size_bytes: 512,
        };
        let cloned = stats.clone();
        assert_eq!(stats, cloned);
    }
}
