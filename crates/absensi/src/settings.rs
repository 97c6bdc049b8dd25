//! Settings store for absensi.
//!
//! Settings are JSON values under string keys. Structured concerns get
//! typed operations on [`SettingsStore`] instead of magic keys: the
//! per-school attendance flag, the admin password (which writes an audit
//! entry), the admin profile and the registered school list.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{format_instant, generate_id, AdminProfile, PasswordChangeEntry};
use crate::storage::{conversion_error, Storage};

/// Key of the admin password.
pub const ADMIN_PASSWORD_KEY: &str = "adminPassword";

/// Key of the admin profile.
pub const ADMIN_PROFILE_KEY: &str = "adminProfile";

/// Key of the authoritative list of registered school names.
pub const SCHOOL_LIST_KEY: &str = "schoolList";

/// Password seeded into a new database.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Username recorded in the audit log for admin password changes.
pub const ADMIN_USERNAME: &str = "admin";

/// School recorded in the audit log for admin password changes.
const ADMIN_LOG_SCHOOL: &str = "-";

/// Prefix of the per-school attendance flag keys.
const ATTENDANCE_ENABLED_PREFIX: &str = "attendance_enabled_";

/// Key of the attendance flag for a school.
fn attendance_enabled_key(school_name: &str) -> String {
    format!("{ATTENDANCE_ENABLED_PREFIX}{school_name}")
}

/// Keys only writable through their typed operations.
fn is_reserved_key(key: &str) -> bool {
    key == ADMIN_PASSWORD_KEY || key == SCHOOL_LIST_KEY || key.starts_with(ATTENDANCE_ENABLED_PREFIX)
}

/// Typed access to the settings table.
#[derive(Debug, Clone, Copy)]
pub struct SettingsStore<'a> {
    storage: &'a Storage,
}

impl<'a> SettingsStore<'a> {
    /// Create a settings store over an open storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Read a setting, returning `None` when the key is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON does not
    /// decode as `T`.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        read_setting(self.storage.conn(), key)
    }

    /// Write a setting, replacing any previous value.
    ///
    /// The admin password, the school list and the attendance flags are
    /// only writable through [`Self::set_admin_password`],
    /// [`Self::register_school`] and friends, and
    /// [`Self::set_attendance_enabled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedSetting`] for those keys, or an error if the
    /// value cannot be encoded or written.
    pub fn update_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        if is_reserved_key(key) {
            return Err(Error::ReservedSetting {
                key: key.to_string(),
            });
        }
        write_setting(self.storage.conn(), key, value)
    }

    /// Whether QR attendance is enabled for a school. Unset means enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn attendance_enabled(&self, school_name: &str) -> Result<bool> {
        let flag: Option<bool> = self.get_setting(&attendance_enabled_key(school_name))?;
        Ok(flag != Some(false))
    }

    /// Enable or disable QR attendance for a school.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_attendance_enabled(&self, school_name: &str, enabled: bool) -> Result<()> {
        write_setting(self.storage.conn(), &attendance_enabled_key(school_name), &enabled)?;
        info!(
            "Attendance {} for school '{}'",
            if enabled { "enabled" } else { "disabled" },
            school_name
        );
        Ok(())
    }

    /// The current admin password, if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn admin_password(&self) -> Result<Option<String>> {
        self.get_setting(ADMIN_PASSWORD_KEY)
    }

    /// Check a candidate admin password (plaintext equality).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn verify_admin_password(&self, candidate: &str) -> Result<bool> {
        Ok(self.admin_password()?.as_deref() == Some(candidate))
    }

    /// Replace the admin password and record the change in the audit log.
    ///
    /// Both writes happen in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_admin_password(&self, new_password: &str) -> Result<PasswordChangeEntry> {
        let tx = self.storage.conn().unchecked_transaction()?;
        write_setting(&tx, ADMIN_PASSWORD_KEY, new_password)?;
        let entry = append_password_change(&tx, ADMIN_LOG_SCHOOL, ADMIN_USERNAME)?;
        tx.commit()?;
        info!("Admin password changed");
        Ok(entry)
    }

    /// The stored admin profile, or the default one when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn admin_profile(&self) -> Result<AdminProfile> {
        Ok(self.get_setting(ADMIN_PROFILE_KEY)?.unwrap_or_default())
    }

    /// Replace the admin profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_admin_profile(&self, profile: &AdminProfile) -> Result<()> {
        self.update_setting(ADMIN_PROFILE_KEY, profile)
    }

    /// Registered school names in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn school_list(&self) -> Result<Vec<String>> {
        read_school_list(self.storage.conn())
    }

    /// Register a new school name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchoolAlreadyRegistered`] if the name is taken.
    pub fn register_school(&self, school_name: &str) -> Result<()> {
        if !register_school_name(self.storage.conn(), school_name)? {
            return Err(Error::SchoolAlreadyRegistered(school_name.to_string()));
        }
        info!("Registered school '{}'", school_name);
        Ok(())
    }

    /// Rename a registered school, keeping its position in the list and
    /// carrying its attendance flag over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `old_name` is not registered and
    /// [`Error::SchoolAlreadyRegistered`] if `new_name` already is.
    pub fn rename_school(&self, old_name: &str, new_name: &str) -> Result<()> {
        let tx = self.storage.conn().unchecked_transaction()?;
        let mut list = read_school_list(&tx)?;
        if list.iter().any(|s| s == new_name) {
            return Err(Error::SchoolAlreadyRegistered(new_name.to_string()));
        }
        let Some(pos) = list.iter().position(|s| s == old_name) else {
            return Err(Error::not_found("school", old_name));
        };
        list[pos] = new_name.to_string();
        write_setting(&tx, SCHOOL_LIST_KEY, &list)?;

        let flag: Option<bool> = read_setting(&tx, &attendance_enabled_key(old_name))?;
        if let Some(flag) = flag {
            write_setting(&tx, &attendance_enabled_key(new_name), &flag)?;
            tx.execute(
                "DELETE FROM settings WHERE key = ?1",
                [attendance_enabled_key(old_name)],
            )?;
        }
        tx.commit()?;

        info!("Renamed school '{}' to '{}'", old_name, new_name);
        Ok(())
    }

    /// Remove a school name from the list. Returns `false` if it was not
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn unregister_school(&self, school_name: &str) -> Result<bool> {
        let conn = self.storage.conn();
        let mut list = read_school_list(conn)?;
        let before = list.len();
        list.retain(|s| s != school_name);
        if list.len() == before {
            return Ok(false);
        }
        write_setting(conn, SCHOOL_LIST_KEY, &list)?;
        Ok(true)
    }

    /// Password change audit entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn password_change_log(&self) -> Result<Vec<PasswordChangeEntry>> {
        let mut stmt = self.storage.conn().prepare(
            r"
            SELECT id, school_name, operator_username, timestamp
            FROM password_change_log ORDER BY timestamp DESC, rowid DESC
            ",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let timestamp: String = row.get(3)?;
                Ok(PasswordChangeEntry {
                    id: row.get(0)?,
                    school_name: row.get(1)?,
                    operator_username: row.get(2)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| conversion_error(3, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Dismiss one audit entry. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_password_change_entry(&self, id: &str) -> Result<bool> {
        let affected = self
            .storage
            .conn()
            .execute("DELETE FROM password_change_log WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

pub(crate) fn read_setting<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;

    raw.map(|value| serde_json::from_str(&value))
        .transpose()
        .map_err(Error::from)
}

pub(crate) fn write_setting<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        params![key, encoded],
    )?;
    debug!("Updated setting {}", key);
    Ok(())
}

/// Read the registered school list (empty when unset).
pub(crate) fn read_school_list(conn: &Connection) -> Result<Vec<String>> {
    Ok(read_setting(conn, SCHOOL_LIST_KEY)?.unwrap_or_default())
}

/// Append a school name to the list. Returns `false` if already present.
pub(crate) fn register_school_name(conn: &Connection, school_name: &str) -> Result<bool> {
    let mut list = read_school_list(conn)?;
    if list.iter().any(|s| s == school_name) {
        return Ok(false);
    }
    list.push(school_name.to_string());
    write_setting(conn, SCHOOL_LIST_KEY, &list)?;
    Ok(true)
}

/// Append an entry to the password change audit log.
pub(crate) fn append_password_change(
    conn: &Connection,
    school_name: &str,
    username: &str,
) -> Result<PasswordChangeEntry> {
    let entry = PasswordChangeEntry {
        id: generate_id("log"),
        school_name: school_name.to_string(),
        operator_username: username.to_string(),
        timestamp: Utc::now().trunc_subsecs(3),
    };
    conn.execute(
        r"
        INSERT INTO password_change_log (id, school_name, operator_username, timestamp)
        VALUES (?1, ?2, ?3, ?4)
        ",
        params![
            entry.id,
            entry.school_name,
            entry.operator_username,
            format_instant(entry.timestamp),
        ],
    )?;
    Ok(entry)
}

/// Write first-run defaults that are missing.
pub(crate) fn seed_defaults(conn: &Connection) -> Result<()> {
    let password: Option<String> = read_setting(conn, ADMIN_PASSWORD_KEY)?;
    if password.is_none() {
        write_setting(conn, ADMIN_PASSWORD_KEY, DEFAULT_ADMIN_PASSWORD)?;
        info!("Seeded default admin password");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_generic_setting_round_trip() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        assert_eq!(settings.get_setting::<u32>("answer").unwrap(), None);
        settings.update_setting("answer", &42_u32).unwrap();
        assert_eq!(settings.get_setting::<u32>("answer").unwrap(), Some(42));

        settings.update_setting("answer", &7_u32).unwrap();
        assert_eq!(settings.get_setting::<u32>("answer").unwrap(), Some(7));
    }

    #[test]
    fn test_setting_type_mismatch_is_error() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        settings.update_setting("flag", "not a number").unwrap();
        let result = settings.get_setting::<u32>("flag");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_attendance_enabled_defaults_to_true() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        assert!(settings.attendance_enabled("SMA 1").unwrap());
        settings.set_attendance_enabled("SMA 1", false).unwrap();
        assert!(!settings.attendance_enabled("SMA 1").unwrap());
        assert!(settings.attendance_enabled("SMA 2").unwrap());
    }

    #[test]
    fn test_default_admin_password_seeded() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        assert!(settings.verify_admin_password(DEFAULT_ADMIN_PASSWORD).unwrap());
        assert!(!settings.verify_admin_password("wrong").unwrap());
    }

    #[test]
    fn test_set_admin_password_writes_audit_entry() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        assert!(settings.password_change_log().unwrap().is_empty());

        let entry = settings.set_admin_password("rahasia99").unwrap();
        assert_eq!(entry.operator_username, ADMIN_USERNAME);
        assert!(settings.verify_admin_password("rahasia99").unwrap());

        let log = settings.password_change_log().unwrap();
        assert_eq!(log, vec![entry]);
    }

    #[test]
    fn test_generic_update_rejects_typed_keys() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        let err = settings.update_setting(ADMIN_PASSWORD_KEY, "direct").unwrap_err();
        assert!(matches!(err, Error::ReservedSetting { ref key } if key == ADMIN_PASSWORD_KEY));
        assert!(err.is_constraint_violation());
        assert!(settings.verify_admin_password(DEFAULT_ADMIN_PASSWORD).unwrap());
        assert!(settings.password_change_log().unwrap().is_empty());

        assert!(matches!(
            settings.update_setting(SCHOOL_LIST_KEY, &vec!["SMA 1"]),
            Err(Error::ReservedSetting { .. })
        ));
        assert!(matches!(
            settings.update_setting(&attendance_enabled_key("SMA 1"), &false),
            Err(Error::ReservedSetting { .. })
        ));
        assert!(settings.attendance_enabled("SMA 1").unwrap());

        // The typed operations still write those keys.
        settings.set_attendance_enabled("SMA 1", false).unwrap();
        assert!(!settings.attendance_enabled("SMA 1").unwrap());
    }

    #[test]
    fn test_password_change_log_rejects_corrupt_timestamp() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);
        storage
            .conn()
            .execute(
                "INSERT INTO password_change_log (id, school_name, operator_username, timestamp)
                 VALUES ('log-bad', 'SMA 1', 'absen', 'yesterday')",
                [],
            )
            .unwrap();

        let err = settings.password_change_log().unwrap_err();
        assert!(matches!(
            err,
            Error::DatabaseQuery(rusqlite::Error::FromSqlConversionFailure(3, _, _))
        ));
    }

    #[test]
    fn test_clear_password_change_entry() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        let entry = settings.set_admin_password("baru123").unwrap();
        assert!(settings.clear_password_change_entry(&entry.id).unwrap());
        assert!(!settings.clear_password_change_entry(&entry.id).unwrap());
        assert!(settings.password_change_log().unwrap().is_empty());
    }

    #[test]
    fn test_admin_profile_round_trip() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        assert_eq!(settings.admin_profile().unwrap(), AdminProfile::default());

        let profile = AdminProfile {
            full_name: "Siti Aminah".to_string(),
            nip: Some("19800101".to_string()),
            phone: None,
        };
        settings.set_admin_profile(&profile).unwrap();
        assert_eq!(settings.admin_profile().unwrap(), profile);
    }

    #[test]
    fn test_register_school_rejects_duplicates() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        settings.register_school("SMA 1").unwrap();
        settings.register_school("SMA 2").unwrap();
        let err = settings.register_school("SMA 1").unwrap_err();
        assert!(matches!(err, Error::SchoolAlreadyRegistered(_)));

        assert_eq!(
            settings.school_list().unwrap(),
            vec!["SMA 1".to_string(), "SMA 2".to_string()]
        );
    }

    #[test]
    fn test_rename_school_keeps_position_and_flag() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        settings.register_school("SMA 1").unwrap();
        settings.register_school("SMA 2").unwrap();
        settings.set_attendance_enabled("SMA 1", false).unwrap();

        settings.rename_school("SMA 1", "SMA SATU").unwrap();

        assert_eq!(
            settings.school_list().unwrap(),
            vec!["SMA SATU".to_string(), "SMA 2".to_string()]
        );
        assert!(!settings.attendance_enabled("SMA SATU").unwrap());
        assert!(settings.attendance_enabled("SMA 1").unwrap());
    }

    #[test]
    fn test_rename_school_errors() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        settings.register_school("SMA 1").unwrap();
        settings.register_school("SMA 2").unwrap();

        assert!(settings
            .rename_school("SMA 9", "SMA 10")
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            settings.rename_school("SMA 1", "SMA 2").unwrap_err(),
            Error::SchoolAlreadyRegistered(_)
        ));
    }

    #[test]
    fn test_unregister_school() {
        let storage = create_test_storage();
        let settings = SettingsStore::new(&storage);

        settings.register_school("SMA 1").unwrap();
        assert!(settings.unregister_school("SMA 1").unwrap());
        assert!(!settings.unregister_school("SMA 1").unwrap());
        assert!(settings.school_list().unwrap().is_empty());
    }
}
