//! SQLite database module for course, enrollment and progress storage
//!
//! ## Tables
//!
//! - `users` - Accounts with role and mentor approval flag
//! - `courses` - Courses owned by a mentor
//! - `chapters` - Ordered chapters, UNIQUE(course_id, sequence)
//! - `mentor_students` - Admin allocation of students to mentors
//! - `assignments` - Enrollment of a student in a course
//! - `completions` - Immutable completion facts, UNIQUE(student_id, chapter_id)
//! - `certificates` - One certificate per (student, course)
//!
//! Append-only tables rely on their UNIQUE constraints to settle concurrent
//! inserts; see [`InsertOutcome`].

pub mod schema;
pub mod users;
pub mod courses;
pub mod enrollments;
pub mod progress;
pub mod certificates;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LmsError;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database handle
///
/// Several handles may point at the same file (one per process or worker);
/// consistency between them comes from the schema constraints.
pub struct LmsDb {
    conn: Mutex<Connection>,
}

impl LmsDb {
    /// Open or create the database in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, LmsError> {
        let db_path = storage_dir.join("lms.db");
        Self::open_file(&db_path)
    }

    /// Open or create the database at an explicit file path
    pub fn open_file(db_path: &Path) -> Result<Self, LmsError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| LmsError::Internal(format!("Failed to open SQLite: {}", e)))?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| LmsError::Internal(format!("Failed to set busy timeout: {}", e)))?;

        // WAL lets readers proceed while another connection writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| LmsError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LmsError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            LmsError::Internal(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LmsError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| LmsError::Internal(format!("Failed to enable foreign keys: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LmsError>
    where
        F: FnOnce(&Connection) -> Result<T, LmsError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LmsError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write operation that needs a mutable connection (transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, LmsError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LmsError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| LmsError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, LmsError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64, LmsError> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                user_count: count("SELECT COUNT(*) FROM users")?,
                course_count: count("SELECT COUNT(*) FROM courses")?,
                chapter_count: count("SELECT COUNT(*) FROM chapters")?,
                completion_count: count("SELECT COUNT(*) FROM completions")?,
                certificate_count: count("SELECT COUNT(*) FROM certificates")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub user_count: u64,
    pub course_count: u64,
    pub chapter_count: u64,
    pub completion_count: u64,
    pub certificate_count: u64,
}

/// Result of an insert-if-absent against a UNIQUE key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the row
    Created,
    /// A row with the same key was already there (possibly written by a
    /// concurrent request a moment earlier)
    AlreadyExisted,
}

impl InsertOutcome {
    pub fn is_created(self) -> bool {
        self == InsertOutcome::Created
    }
}

/// Classify the result of an `INSERT ... ON CONFLICT DO NOTHING`.
///
/// Zero changed rows and a unique/primary-key violation both mean another
/// writer got there first. Any other failure is an internal error.
pub fn classify_insert(result: Result<usize, rusqlite::Error>) -> Result<InsertOutcome, LmsError> {
    match result {
        Ok(0) => Ok(InsertOutcome::AlreadyExisted),
        Ok(_) => Ok(InsertOutcome::Created),
        Err(ref e) if is_unique_violation(e) => Ok(InsertOutcome::AlreadyExisted),
        Err(e) => Err(LmsError::Internal(format!("Insert failed: {}", e))),
    }
}

/// True if the error is a UNIQUE or PRIMARY KEY constraint failure
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Generate a new row identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// Re-exports
pub use certificates::CertificateRow;
pub use courses::{ChapterRow, CourseRow, CreateChapterInput, CreateCourseInput, UpdateCourseInput};
pub use enrollments::{AllocatedStudent, AssignmentRow};
pub use progress::CompletionRow;
pub use users::{NewUser, Role, UserRow};
