//! Student directory.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{generate_id, Student, StudentInput};
use crate::storage::{row_to_student, Storage, STUDENT_COLUMNS};

/// Students of every school, addressed by id.
///
/// Deleting a student never touches its attendance records; those keep a
/// dangling `student_id` and drop out of class-filtered queries.
#[derive(Debug, Clone, Copy)]
pub struct StudentDirectory<'a> {
    storage: &'a Storage,
}

impl<'a> StudentDirectory<'a> {
    /// Create a student directory over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Students of a school, optionally limited to one class, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, school_name: &str, class_name: Option<&str>) -> Result<Vec<Student>> {
        let conn = self.storage.conn();
        let students = match class_name {
            Some(class_name) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE school_name = ?1 AND class_name = ?2
                     ORDER BY name COLLATE NOCASE, id"
                ))?;
                let rows = stmt.query_map(params![school_name, class_name], row_to_student)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE school_name = ?1
                     ORDER BY name COLLATE NOCASE, id"
                ))?;
                let rows = stmt.query_map([school_name], row_to_student)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(students)
    }

    /// Get a student by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: &str) -> Result<Option<Student>> {
        get_student(self.storage.conn(), id)
    }

    /// Find a student of a school by NIS.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_nis(&self, school_name: &str, nis: &str) -> Result<Option<Student>> {
        let student = self
            .storage
            .conn()
            .query_row(
                &format!(
                    "SELECT {STUDENT_COLUMNS} FROM students WHERE school_name = ?1 AND nis = ?2"
                ),
                params![school_name, nis],
                row_to_student,
            )
            .optional()?;
        Ok(student)
    }

    /// Add a student to a school.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateNis`] if the NIS is already used in the
    /// school.
    pub fn add(&self, school_name: &str, input: StudentInput) -> Result<Student> {
        if self.find_by_nis(school_name, &input.nis)?.is_some() {
            return Err(Error::DuplicateNis {
                school: school_name.to_string(),
                nis: input.nis,
            });
        }

        let student = Student {
            id: generate_id("student"),
            name: input.name,
            school_name: school_name.to_string(),
            class_name: input.class_name,
            nis: input.nis,
            parent_phone: input.parent_phone,
        };
        insert_student(self.storage.conn(), &student)?;

        info!(
            "Added student {} ({}) to {}",
            student.name, student.class_name, school_name
        );
        Ok(student)
    }

    /// Replace a student's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student does not exist and
    /// [`Error::DuplicateNis`] if the new NIS belongs to another student of
    /// the same school.
    pub fn update(&self, id: &str, input: StudentInput) -> Result<Student> {
        let Some(existing) = self.get(id)? else {
            return Err(Error::not_found("student", id));
        };

        if let Some(other) = self.find_by_nis(&existing.school_name, &input.nis)? {
            if other.id != existing.id {
                return Err(Error::DuplicateNis {
                    school: existing.school_name,
                    nis: input.nis,
                });
            }
        }

        let updated = Student {
            id: existing.id,
            name: input.name,
            school_name: existing.school_name,
            class_name: input.class_name,
            nis: input.nis,
            parent_phone: input.parent_phone,
        };
        self.storage.conn().execute(
            r"
            UPDATE students SET name = ?2, class_name = ?3, nis = ?4, parent_phone = ?5
            WHERE id = ?1
            ",
            params![
                updated.id,
                updated.name,
                updated.class_name,
                updated.nis,
                updated.parent_phone,
            ],
        )?;

        debug!("Updated student {}", updated.id);
        Ok(updated)
    }

    /// Delete a student. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .storage
            .conn()
            .execute("DELETE FROM students WHERE id = ?1", [id])?;
        if affected > 0 {
            info!("Deleted student {}", id);
        }
        Ok(affected > 0)
    }

    /// Number of students in a school.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self, school_name: &str) -> Result<i64> {
        let count: i64 = self.storage.conn().query_row(
            "SELECT COUNT(*) FROM students WHERE school_name = ?1",
            [school_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(crate) fn get_student(conn: &Connection, id: &str) -> Result<Option<Student>> {
    let student = conn
        .query_row(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
            [id],
            row_to_student,
        )
        .optional()?;
    Ok(student)
}

pub(crate) fn insert_student(conn: &Connection, student: &Student) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO students (id, name, school_name, class_name, nis, parent_phone)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            student.id,
            student.name,
            student.school_name,
            student.class_name,
            student.nis,
            student.parent_phone,
        ],
    )?;
    Ok(())
}
