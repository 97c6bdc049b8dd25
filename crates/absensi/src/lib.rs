//! `absensi` - An offline attendance store for schools
//!
//! This library keeps student and teacher directories, QR check-in and
//! check-out records, manual sick/permission marks, per-school settings
//! and directory backups in a single local SQLite file.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod backup;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod model;
pub mod settings;
pub mod storage;

pub use attendance::{AttendanceEngine, ManualMark, RecordFilter, ScanEvent, ScanOutcome};
pub use backup::{BackupInfo, BackupManager};
pub use config::Config;
pub use directory::{OperatorDirectory, SchoolInfoStore, StudentDirectory, TeacherDirectory};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use settings::SettingsStore;
pub use storage::{Storage, StorageOptions, StorageStats};
