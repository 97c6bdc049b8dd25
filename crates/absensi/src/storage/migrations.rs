//! Database migration system for absensi.
//!
//! This module handles database schema versioning and migrations. The whole
//! upgrade, including the legacy school-name backfill, runs inside a single
//! transaction: either the file ends up at [`CURRENT_VERSION`] or it is left
//! exactly as it was.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::settings;

use super::schema::{
    CREATE_SCHOOL_INFO_TABLE, LEGACY_INDEX_NAMES, MULTI_SCHOOL_INDEX_STATEMENTS,
    SCHEMA_STATEMENTS,
};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Id of the single school info row written by schema version 1.
const LEGACY_SCHOOL_INFO_ID: i64 = 1;

/// Tables whose rows carry a school identifier from version 2 on.
const SCHOOL_SCOPED_TABLES: &[&str] = &["students", "teachers", "attendance_records", "operator_users"];

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
/// `legacy_school_fallback` names the school used for the version 2
/// backfill when the legacy school info record is missing.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails. Nothing is
/// committed in that case.
pub fn initialize_schema(conn: &mut Connection, legacy_school_fallback: Option<&str>) -> Result<()> {
    let tx = conn.transaction()?;

    // Create base schema
    for statement in SCHEMA_STATEMENTS {
        tx.execute(statement, [])?;
    }

    // Check and run migrations
    let version = get_schema_version(&tx)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    if version < CURRENT_VERSION {
        run_migrations(&tx, version, legacy_school_fallback)?;
    }

    tx.commit()?;
    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Run migrations from the given version to the current version.
fn run_migrations(conn: &Connection, from_version: i32, legacy_school_fallback: Option<&str>) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current, legacy_school_fallback)?;
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Run a specific migration version.
fn run_migration(conn: &Connection, version: i32, legacy_school_fallback: Option<&str>) -> Result<()> {
    debug!("Running schema migration to version {}", version);
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn, legacy_school_fallback),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Migration to version 1 (single-school schema).
///
/// This is a no-op since the version 1 tables are created by `SCHEMA_STATEMENTS`.
fn migrate_v1(conn: &Connection) -> Result<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration to version 2 (multi-school).
///
/// Every step is guarded, so running it against a freshly created database
/// only adds the new indexes.
fn migrate_v2(conn: &Connection, legacy_school_fallback: Option<&str>) -> Result<()> {
    let legacy_name =
        read_legacy_school_name(conn)?.or_else(|| legacy_school_fallback.map(str::to_string));

    rekey_school_info(conn)?;

    for table in SCHOOL_SCOPED_TABLES {
        ensure_column(conn, table, "school_name", "TEXT")?;
    }

    for index in LEGACY_INDEX_NAMES {
        conn.execute(&format!("DROP INDEX IF EXISTS {index}"), [])?;
    }

    match legacy_name {
        Some(name) => {
            let stamped = backfill_school_name(conn, &name)?;
            if stamped > 0 {
                info!("Stamped {} legacy records with school '{}'", stamped, name);
            }
            settings::register_school_name(conn, &name)?;
        }
        None => {
            if count_unstamped(conn)? > 0 {
                warn!("Legacy records found but no legacy school name is known; leaving them unstamped");
            }
        }
    }

    for statement in MULTI_SCHOOL_INDEX_STATEMENTS {
        conn.execute(statement, [])?;
    }

    set_schema_version(conn, 2)?;
    Ok(())
}

/// Read the school name from the single-school info record, if this is a
/// version 1 layout that has one.
fn read_legacy_school_name(conn: &Connection) -> Result<Option<String>> {
    if !table_has_column(conn, "school_info", "id")? {
        return Ok(None);
    }

    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM school_info WHERE id = ?1",
            [LEGACY_SCHOOL_INFO_ID],
            |row| row.get(0),
        )
        .optional()?;

    Ok(name.filter(|n| !n.trim().is_empty()))
}

/// Rebuild a version 1 `school_info` table (integer key) as the name-keyed
/// version 2 table, keeping its rows.
fn rekey_school_info(conn: &Connection) -> Result<()> {
    if !table_has_column(conn, "school_info", "id")? {
        return Ok(());
    }

    conn.execute("ALTER TABLE school_info RENAME TO school_info_v1", [])?;
    conn.execute(CREATE_SCHOOL_INFO_TABLE, [])?;
    conn.execute(
        r"
        INSERT OR REPLACE INTO school_info (name, address, headmaster, headmaster_nip, logo_base64)
        SELECT name, address, headmaster, headmaster_nip, logo_base64
        FROM school_info_v1 ORDER BY id
        ",
        [],
    )?;
    conn.execute("DROP TABLE school_info_v1", [])?;
    debug!("Re-keyed school_info by school name");
    Ok(())
}

/// Stamp every row lacking a school identifier with `school_name`.
///
/// Rows that already carry a school are left untouched, so running this
/// twice stamps nothing the second time. Returns the number of rows stamped.
pub(crate) fn backfill_school_name(conn: &Connection, school_name: &str) -> Result<usize> {
    let mut stamped = 0;
    for table in SCHOOL_SCOPED_TABLES {
        stamped += conn.execute(
            &format!("UPDATE {table} SET school_name = ?1 WHERE school_name IS NULL"),
            [school_name],
        )?;
    }
    Ok(stamped)
}

/// Count rows across the school-scoped tables that carry no school.
fn count_unstamped(conn: &Connection) -> Result<i64> {
    let mut total = 0;
    for table in SCHOOL_SCOPED_TABLES {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE school_name IS NULL"),
            [],
            |row| row.get(0),
        )?;
        total += count;
    }
    Ok(total)
}

/// Add a column to a table unless it is already there.
fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    if table_has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])?;
    debug!("Added column {}.{}", table, column);
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
