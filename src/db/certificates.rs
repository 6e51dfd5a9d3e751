//! Certificate records

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{classify_insert, current_timestamp, new_id, InsertOutcome};
use crate::error::LmsError;

/// Certificate row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRow {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub issued_at: String,
}

impl CertificateRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            course_id: row.get("course_id")?,
            issued_at: row.get("issued_at")?,
        })
    }
}

/// Get the certificate for (student, course)
pub fn get_certificate(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<Option<CertificateRow>, LmsError> {
    conn.query_row(
        "SELECT * FROM certificates WHERE student_id = ? AND course_id = ?",
        params![student_id, course_id],
        CertificateRow::from_row,
    )
    .optional()
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Fetch the certificate for (student, course), creating it on first call.
///
/// An existing row is returned untouched, so `issued_at` and `id` are stable
/// across repeated downloads.
pub fn get_or_create_certificate(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<(CertificateRow, InsertOutcome), LmsError> {
    if let Some(existing) = get_certificate(conn, student_id, course_id)? {
        return Ok((existing, InsertOutcome::AlreadyExisted));
    }

    let outcome = classify_insert(conn.execute(
        r#"
        INSERT INTO certificates (id, student_id, course_id, issued_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
        params![new_id(), student_id, course_id, current_timestamp()],
    ))?;

    let row = get_certificate(conn, student_id, course_id)?
        .ok_or_else(|| LmsError::Internal("Certificate not found after insert".to_string()))?;

    Ok((row, outcome))
}

/// Count all issued certificates
pub fn count_certificates(conn: &Connection) -> Result<u64, LmsError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))
        .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count as u64)
}
