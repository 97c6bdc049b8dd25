//! School identity records, keyed by school name.

use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::SchoolInfo;
use crate::storage::Storage;

/// Letterhead details per school.
#[derive(Debug, Clone, Copy)]
pub struct SchoolInfoStore<'a> {
    storage: &'a Storage,
}

impl<'a> SchoolInfoStore<'a> {
    /// Create a school info store over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Letterhead of a school, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, school_name: &str) -> Result<Option<SchoolInfo>> {
        let info = self
            .storage
            .conn()
            .query_row(
                r"
                SELECT name, address, headmaster, headmaster_nip, logo_base64
                FROM school_info WHERE name = ?1
                ",
                [school_name],
                |row| {
                    Ok(SchoolInfo {
                        name: row.get(0)?,
                        address: row.get(1)?,
                        headmaster: row.get(2)?,
                        headmaster_nip: row.get(3)?,
                        logo_base64: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Insert or replace the record for `info.name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert(&self, info: &SchoolInfo) -> Result<()> {
        self.storage.conn().execute(
            r"
            INSERT OR REPLACE INTO school_info
                (name, address, headmaster, headmaster_nip, logo_base64)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                info.name,
                info.address,
                info.headmaster,
                info.headmaster_nip,
                info.logo_base64,
            ],
        )?;
        info!("Saved school info for {}", info.name);
        Ok(())
    }

    /// Move a school's record to a new key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no record for `old_name`.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let affected = self.storage.conn().execute(
            "UPDATE school_info SET name = ?2 WHERE name = ?1",
            params![old_name, new_name],
        )?;
        if affected == 0 {
            return Err(Error::not_found("school info", old_name));
        }
        Ok(())
    }

    /// Delete a school's record. Returns `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, school_name: &str) -> Result<bool> {
        let affected = self
            .storage
            .conn()
            .execute("DELETE FROM school_info WHERE name = ?1", [school_name])?;
        Ok(affected > 0)
    }
}
