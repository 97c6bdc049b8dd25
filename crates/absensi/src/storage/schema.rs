//! `SQLite` schema definitions for absensi.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema. Tables are created with their current column set;
//! indexes over the multi-school columns are created by the version 2
//! migration so that legacy files can gain those columns first.

/// SQL statement to create the students table.
pub const CREATE_STUDENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    school_name TEXT,
    class_name TEXT NOT NULL,
    nis TEXT NOT NULL,
    parent_phone TEXT
)
";

/// SQL statement to create the teachers table.
///
/// `subjects` and `classes` hold JSON arrays of strings.
pub const CREATE_TEACHERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS teachers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    nip TEXT,
    subjects TEXT NOT NULL DEFAULT '[]',
    classes TEXT NOT NULL DEFAULT '[]',
    school_name TEXT
)
";

/// SQL statement to create the attendance records table.
pub const CREATE_ATTENDANCE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attendance_records (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    school_name TEXT,
    date TEXT NOT NULL,
    status TEXT NOT NULL,
    check_in TEXT,
    check_out TEXT,
    timeliness TEXT,
    semester TEXT
)
";

/// SQL statement to create the school info table, keyed by school name.
pub const CREATE_SCHOOL_INFO_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS school_info (
    name TEXT PRIMARY KEY,
    address TEXT NOT NULL DEFAULT '',
    headmaster TEXT NOT NULL DEFAULT '',
    headmaster_nip TEXT,
    logo_base64 TEXT
)
";

/// SQL statement to create the settings table (JSON encoded values).
pub const CREATE_SETTINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the operator users table.
pub const CREATE_OPERATOR_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS operator_users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    school_name TEXT
)
";

/// SQL statement to create the directory backups table.
pub const CREATE_DATA_BACKUPS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS data_backups (
    school_name TEXT PRIMARY KEY,
    snapshot TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the password change audit log.
pub const CREATE_PASSWORD_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS password_change_log (
    id TEXT PRIMARY KEY,
    school_name TEXT NOT NULL,
    operator_username TEXT NOT NULL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Index on attendance dates for report queries.
pub const CREATE_ATTENDANCE_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance_records(date)
";

/// Index on student classes.
pub const CREATE_STUDENTS_CLASS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name)
";

/// Index on teacher names.
pub const CREATE_TEACHERS_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_teachers_name ON teachers(name)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_STUDENTS_TABLE,
    CREATE_TEACHERS_TABLE,
    CREATE_ATTENDANCE_TABLE,
    CREATE_SCHOOL_INFO_TABLE,
    CREATE_SETTINGS_TABLE,
    CREATE_OPERATOR_USERS_TABLE,
    CREATE_DATA_BACKUPS_TABLE,
    CREATE_PASSWORD_LOG_TABLE,
    CREATE_METADATA_TABLE,
    CREATE_ATTENDANCE_DATE_INDEX,
    CREATE_STUDENTS_CLASS_INDEX,
    CREATE_TEACHERS_NAME_INDEX,
];

/// One attendance record per (school, student, date, subject).
pub const CREATE_ATTENDANCE_TUPLE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_tuple
ON attendance_records(school_name, student_id, date, subject)
";

/// Operator usernames are unique per school.
pub const CREATE_OPERATOR_SCHOOL_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_operator_users_username_school
ON operator_users(username, school_name)
";

/// Students scoped by school and class.
pub const CREATE_STUDENTS_SCHOOL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_students_school_class ON students(school_name, class_name)
";

/// Teachers scoped by school.
pub const CREATE_TEACHERS_SCHOOL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_teachers_school ON teachers(school_name)
";

/// Indexes introduced with multi-school support (schema version 2).
pub const MULTI_SCHOOL_INDEX_STATEMENTS: &[&str] = &[
    CREATE_ATTENDANCE_TUPLE_INDEX,
    CREATE_OPERATOR_SCHOOL_INDEX,
    CREATE_STUDENTS_SCHOOL_INDEX,
    CREATE_TEACHERS_SCHOOL_INDEX,
];

/// Single-school indexes replaced by the multi-school ones.
pub const LEGACY_INDEX_NAMES: &[&str] = &[
    "idx_attendance_student_date_subject",
    "idx_operator_users_username",
];

/// Layout written by schema version 1 (single school).
///
/// Kept so upgrade paths can be exercised against a faithful legacy file.
pub const LEGACY_V1_STATEMENTS: &[&str] = &[
    r"CREATE TABLE students (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        nis TEXT NOT NULL,
        parent_phone TEXT
    )",
    r"CREATE INDEX idx_students_class ON students(class_name)",
    r"CREATE TABLE teachers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        nip TEXT,
        subjects TEXT NOT NULL DEFAULT '[]',
        classes TEXT NOT NULL DEFAULT '[]'
    )",
    r"CREATE TABLE attendance_records (
        id TEXT PRIMARY KEY,
        student_id TEXT NOT NULL,
        subject TEXT NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        check_in TEXT,
        check_out TEXT,
        timeliness TEXT,
        semester TEXT
    )",
    r"CREATE UNIQUE INDEX idx_attendance_student_date_subject
        ON attendance_records(student_id, date, subject)",
    r"CREATE INDEX idx_attendance_date ON attendance_records(date)",
    r"CREATE TABLE school_info (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        address TEXT NOT NULL DEFAULT '',
        headmaster TEXT NOT NULL DEFAULT '',
        headmaster_nip TEXT,
        logo_base64 TEXT
    )",
    r"CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    r"CREATE TABLE operator_users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        password TEXT NOT NULL
    )",
    r"CREATE UNIQUE INDEX idx_operator_users_username ON operator_users(username)",
    r"CREATE TABLE data_backups (
        school_name TEXT PRIMARY KEY,
        snapshot TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    r"CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    r"INSERT INTO metadata (key, value) VALUES ('schema_version', '1')",
];
