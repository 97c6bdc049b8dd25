//! Teacher directory.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{generate_id, Teacher, TeacherInput};
use crate::storage::{row_to_teacher, Storage, TEACHER_COLUMNS};

/// Teachers of every school, addressed by id.
#[derive(Debug, Clone, Copy)]
pub struct TeacherDirectory<'a> {
    storage: &'a Storage,
}

impl<'a> TeacherDirectory<'a> {
    /// Create a teacher directory over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Teachers of a school sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, school_name: &str) -> Result<Vec<Teacher>> {
        let mut stmt = self.storage.conn().prepare(&format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers
             WHERE school_name = ?1
             ORDER BY name COLLATE NOCASE, id"
        ))?;

        let teachers = stmt
            .query_map([school_name], row_to_teacher)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(teachers)
    }

    /// Get a teacher by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: &str) -> Result<Option<Teacher>> {
        let teacher = self
            .storage
            .conn()
            .query_row(
                &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?1"),
                [id],
                row_to_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    /// Add a teacher to a school.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn add(&self, school_name: &str, input: TeacherInput) -> Result<Teacher> {
        let teacher = Teacher {
            id: generate_id("teacher"),
            name: input.name,
            nip: input.nip,
            subjects: input.subjects,
            classes: input.classes,
            school_name: school_name.to_string(),
        };
        insert_teacher(self.storage.conn(), &teacher)?;

        info!("Added teacher {} to {}", teacher.name, school_name);
        Ok(teacher)
    }

    /// Replace a teacher's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the teacher does not exist.
    pub fn update(&self, id: &str, input: TeacherInput) -> Result<Teacher> {
        let Some(existing) = self.get(id)? else {
            return Err(Error::not_found("teacher", id));
        };

        let updated = Teacher {
            id: existing.id,
            name: input.name,
            nip: input.nip,
            subjects: input.subjects,
            classes: input.classes,
            school_name: existing.school_name,
        };
        self.storage.conn().execute(
            "UPDATE teachers SET name = ?2, nip = ?3, subjects = ?4, classes = ?5 WHERE id = ?1",
            params![
                updated.id,
                updated.name,
                updated.nip,
                serde_json::to_string(&updated.subjects)?,
                serde_json::to_string(&updated.classes)?,
            ],
        )?;

        debug!("Updated teacher {}", updated.id);
        Ok(updated)
    }

    /// Delete a teacher. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .storage
            .conn()
            .execute("DELETE FROM teachers WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// The first teacher (by name) who teaches `subject` to `class_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_for(
        &self,
        school_name: &str,
        class_name: &str,
        subject: &str,
    ) -> Result<Option<Teacher>> {
        Ok(self
            .list(school_name)?
            .into_iter()
            .find(|t| t.teaches(class_name, subject)))
    }
}

pub(crate) fn insert_teacher(conn: &Connection, teacher: &Teacher) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO teachers (id, name, nip, subjects, classes, school_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            teacher.id,
            teacher.name,
            teacher.nip,
            serde_json::to_string(&teacher.subjects)?,
            serde_json::to_string(&teacher.classes)?,
            teacher.school_name,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn input(name: &str, subjects: &[&str], classes: &[&str]) -> TeacherInput {
        TeacherInput {
            name: name.to_string(),
            nip: None,
            subjects: subjects.iter().map(ToString::to_string).collect(),
            classes: classes.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_add_list_get() {
        let storage = create_test_storage();
        let teachers = TeacherDirectory::new(&storage);

        let sari = teachers
            .add("SMA 1", input("Sari", &["Matematika"], &["X-A", "X-B"]))
            .unwrap();
        teachers
            .add("SMA 1", input("Agus", &["Fisika"], &["X-A"]))
            .unwrap();
        teachers
            .add("SMA 2", input("Rina", &["Biologi"], &["X-A"]))
            .unwrap();

        let names: Vec<String> = teachers
            .list("SMA 1")
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Agus", "Sari"]);

        let fetched = teachers.get(&sari.id).unwrap().unwrap();
        assert_eq!(fetched.subjects, vec!["Matematika".to_string()]);
        assert_eq!(fetched.classes.len(), 2);
    }

    #[test]
    fn test_update_and_missing() {
        let storage = create_test_storage();
        let teachers = TeacherDirectory::new(&storage);

        let sari = teachers
            .add("SMA 1", input("Sari", &["Matematika"], &["X-A"]))
            .unwrap();
        let mut edit = input("Sari Dewi", &["Matematika", "Statistika"], &["X-A"]);
        edit.nip = Some("198001012005012001".to_string());

        let updated = teachers.update(&sari.id, edit).unwrap();
        assert_eq!(updated.school_name, "SMA 1");
        assert_eq!(teachers.get(&sari.id).unwrap().unwrap(), updated);

        let err = teachers
            .update("teacher-missing", input("X", &[], &[]))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_find_for_class_and_subject() {
        let storage = create_test_storage();
        let teachers = TeacherDirectory::new(&storage);

        teachers
            .add("SMA 1", input("Sari", &["Matematika"], &["X-A"]))
            .unwrap();
        teachers
            .add("SMA 1", input("Agus", &["Matematika"], &["X-B"]))
            .unwrap();

        let found = teachers.find_for("SMA 1", "X-B", "Matematika").unwrap();
        assert_eq!(found.map(|t| t.name).as_deref(), Some("Agus"));
        assert!(teachers
            .find_for("SMA 1", "X-C", "Matematika")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete() {
        let storage = create_test_storage();
        let teachers = TeacherDirectory::new(&storage);

        let sari = teachers.add("SMA 1", input("Sari", &[], &[])).unwrap();
        assert!(teachers.delete(&sari.id).unwrap());
        assert!(!teachers.delete(&sari.id).unwrap());
    }
}
