//! Operator accounts.
//!
//! Passwords are stored and compared as plaintext; every password change
//! goes to the audit log in the same transaction.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{generate_id, OperatorUser, PasswordChangeEntry};
use crate::settings::append_password_change;
use crate::storage::Storage;

const OPERATOR_COLUMNS: &str = "id, username, password, school_name";

fn row_to_operator(row: &Row) -> rusqlite::Result<OperatorUser> {
    Ok(OperatorUser {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        school_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

/// Operator accounts, unique on (username, school).
#[derive(Debug, Clone, Copy)]
pub struct OperatorDirectory<'a> {
    storage: &'a Storage,
}

impl<'a> OperatorDirectory<'a> {
    /// Create an operator directory over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Operators of one school, or of every school when `school_name` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, school_name: Option<&str>) -> Result<Vec<OperatorUser>> {
        let conn = self.storage.conn();
        let operators = match school_name {
            Some(school_name) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {OPERATOR_COLUMNS} FROM operator_users
                     WHERE school_name = ?1 ORDER BY username"
                ))?;
                let rows = stmt.query_map([school_name], row_to_operator)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {OPERATOR_COLUMNS} FROM operator_users
                     ORDER BY school_name, username"
                ))?;
                let rows = stmt.query_map([], row_to_operator)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(operators)
    }

    /// Find an operator by username within a school.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find(&self, username: &str, school_name: &str) -> Result<Option<OperatorUser>> {
        let operator = self
            .storage
            .conn()
            .query_row(
                &format!(
                    "SELECT {OPERATOR_COLUMNS} FROM operator_users
                     WHERE username = ?1 AND school_name = ?2"
                ),
                params![username, school_name],
                row_to_operator,
            )
            .optional()?;
        Ok(operator)
    }

    /// Check credentials. Returns the operator on a match.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        school_name: &str,
    ) -> Result<Option<OperatorUser>> {
        Ok(self
            .find(username, school_name)?
            .filter(|op| op.password == password))
    }

    /// Create an operator account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateOperator`] if the username is taken in that
    /// school.
    pub fn add(&self, username: &str, password: &str, school_name: &str) -> Result<OperatorUser> {
        if self.find(username, school_name)?.is_some() {
            return Err(Error::DuplicateOperator {
                username: username.to_string(),
                school: school_name.to_string(),
            });
        }

        let operator = OperatorUser {
            id: generate_id("operator"),
            username: username.to_string(),
            password: password.to_string(),
            school_name: school_name.to_string(),
        };
        self.storage.conn().execute(
            r"
            INSERT INTO operator_users (id, username, password, school_name)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                operator.id,
                operator.username,
                operator.password,
                operator.school_name,
            ],
        )?;

        info!("Added operator '{}' for {}", username, school_name);
        Ok(operator)
    }

    /// Change an operator's password and append an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the operator does not exist.
    pub fn update_password(&self, id: &str, new_password: &str) -> Result<PasswordChangeEntry> {
        let tx = self.storage.conn().unchecked_transaction()?;

        let operator = tx
            .query_row(
                &format!("SELECT {OPERATOR_COLUMNS} FROM operator_users WHERE id = ?1"),
                [id],
                row_to_operator,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("operator", id))?;

        tx.execute(
            "UPDATE operator_users SET password = ?2 WHERE id = ?1",
            params![id, new_password],
        )?;
        let entry = append_password_change(&tx, &operator.school_name, &operator.username)?;
        tx.commit()?;

        info!(
            "Password changed for operator '{}' of {}",
            operator.username, operator.school_name
        );
        Ok(entry)
    }

    /// Delete an operator. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .storage
            .conn()
            .execute("DELETE FROM operator_users WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_add_and_find() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);

        let op = operators.add("tu", "rahasia", "SMA 1").unwrap();
        assert!(op.id.starts_with("operator-"));

        assert_eq!(operators.find("tu", "SMA 1").unwrap(), Some(op));
        assert!(operators.find("tu", "SMA 2").unwrap().is_none());
    }

    #[test]
    fn test_username_unique_per_school() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);

        operators.add("tu", "a", "SMA 1").unwrap();
        let err = operators.add("tu", "b", "SMA 1").unwrap_err();
        assert!(matches!(err, Error::DuplicateOperator { .. }));

        operators.add("tu", "c", "SMA 2").unwrap();
        assert_eq!(operators.list(None).unwrap().len(), 2);
        assert_eq!(operators.list(Some("SMA 2")).unwrap().len(), 1);
    }

    #[test]
    fn test_authenticate() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);

        operators.add("tu", "rahasia", "SMA 1").unwrap();
        assert!(operators
            .authenticate("tu", "rahasia", "SMA 1")
            .unwrap()
            .is_some());
        assert!(operators
            .authenticate("tu", "salah", "SMA 1")
            .unwrap()
            .is_none());
        assert!(operators
            .authenticate("tu", "rahasia", "SMA 2")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_password_writes_audit_entry() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);
        let settings = SettingsStore::new(&storage);

        let op = operators.add("tu", "lama", "SMA 1").unwrap();
        let entry = operators.update_password(&op.id, "baru").unwrap();

        assert_eq!(entry.school_name, "SMA 1");
        assert_eq!(entry.operator_username, "tu");
        assert!(operators
            .authenticate("tu", "baru", "SMA 1")
            .unwrap()
            .is_some());

        let log = settings.password_change_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, entry.id);
    }

    #[test]
    fn test_update_password_missing_operator() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);
        let settings = SettingsStore::new(&storage);

        let err = operators
            .update_password("operator-missing", "x")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(settings.password_change_log().unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let storage = create_test_storage();
        let operators = OperatorDirectory::new(&storage);

        let op = operators.add("tu", "a", "SMA 1").unwrap();
        assert!(operators.delete(&op.id).unwrap());
        assert!(operators.list(None).unwrap().is_empty());
    }
}
