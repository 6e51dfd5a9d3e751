//! Completion facts
//!
//! A completion fact records that a student finished a chapter. Facts are
//! never updated or deleted here; UNIQUE(student_id, chapter_id) guarantees
//! at most one per pair even when two requests race to create it.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{classify_insert, current_timestamp, new_id, InsertOutcome};
use crate::error::LmsError;

/// Completion fact row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRow {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub chapter_id: String,
    pub completed_at: String,
}

impl CompletionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            course_id: row.get("course_id")?,
            chapter_id: row.get("chapter_id")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Record a completion fact if none exists for (student, chapter).
///
/// `completed_at` is written only by the call that creates the row.
pub fn insert_completion(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    chapter_id: &str,
) -> Result<InsertOutcome, LmsError> {
    classify_insert(conn.execute(
        r#"
        INSERT INTO completions (id, student_id, course_id, chapter_id, completed_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (student_id, chapter_id) DO NOTHING
        "#,
        params![new_id(), student_id, course_id, chapter_id, current_timestamp()],
    ))
}

/// Get the completion fact for (student, chapter)
pub fn get_completion(
    conn: &Connection,
    student_id: &str,
    chapter_id: &str,
) -> Result<Option<CompletionRow>, LmsError> {
    conn.query_row(
        "SELECT * FROM completions WHERE student_id = ? AND chapter_id = ?",
        params![student_id, chapter_id],
        CompletionRow::from_row,
    )
    .optional()
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Check whether the student completed the chapter
pub fn has_completion(conn: &Connection, student_id: &str, chapter_id: &str) -> Result<bool, LmsError> {
    Ok(get_completion(conn, student_id, chapter_id)?.is_some())
}

/// Chapter IDs the student completed within a course
pub fn completed_chapter_ids(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<HashSet<String>, LmsError> {
    let mut stmt = conn
        .prepare("SELECT chapter_id FROM completions WHERE student_id = ? AND course_id = ?")
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let ids = stmt
        .query_map(params![student_id, course_id], |row| row.get(0))
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<HashSet<String>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(ids)
}

/// Count completion facts for (student, course)
pub fn count_completions(conn: &Connection, student_id: &str, course_id: &str) -> Result<u64, LmsError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM completions WHERE student_id = ? AND course_id = ?",
            params![student_id, course_id],
            |row| row.get(0),
        )
        .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count as u64)
}

/// Count completion facts across all students of a course
pub fn count_course_completions(conn: &Connection, course_id: &str) -> Result<u64, LmsError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM completions WHERE course_id = ?",
            params![course_id],
            |row| row.get(0),
        )
        .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count as u64)
}

/// Completed-chapter count per student for one course (grouped count)
pub fn completion_counts_by_student(
    conn: &Connection,
    course_id: &str,
) -> Result<HashMap<String, u64>, LmsError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT student_id, COUNT(*) AS completed
            FROM completions
            WHERE course_id = ?
            GROUP BY student_id
            "#,
        )
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let counts = stmt
        .query_map(params![course_id], |row| {
            let student_id: String = row.get(0)?;
            let completed: i64 = row.get(1)?;
            Ok((student_id, completed as u64))
        })
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(counts)
}
