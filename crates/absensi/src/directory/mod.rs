//! School-scoped directories: students, teachers, operators and school info.
//!
//! Each store borrows the [`Storage`](crate::storage::Storage) handle and
//! scopes its queries by school name.

pub mod operators;
pub mod school_info;
pub mod students;
pub mod teachers;

pub use operators::OperatorDirectory;
pub use school_info::SchoolInfoStore;
pub use students::StudentDirectory;
pub use teachers::TeacherDirectory;
