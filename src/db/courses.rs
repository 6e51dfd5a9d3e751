//! Course and Chapter CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{current_timestamp, is_unique_violation, new_id};
use crate::error::LmsError;

/// Course row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub mentor_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CourseRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            mentor_id: row.get("mentor_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Chapter row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRow {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub sequence: i64,
    pub created_at: String,
}

impl ChapterRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            course_id: row.get("course_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            image_url: row.get("image_url")?,
            video_url: row.get("video_url")?,
            sequence: row.get("sequence")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Input for creating a course
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for updating a course (owner only)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCourseInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for creating a chapter
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChapterInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub sequence: i64,
}

/// Create a course owned by `mentor_id`
pub fn create_course(
    conn: &Connection,
    mentor_id: &str,
    input: CreateCourseInput,
) -> Result<CourseRow, LmsError> {
    let id = new_id();
    let now = current_timestamp();

    conn.execute(
        r#"
        INSERT INTO courses (id, title, description, mentor_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![id, input.title, input.description, mentor_id, now, now],
    )
    .map_err(|e| LmsError::Internal(format!("Course insert failed: {}", e)))?;

    get_course(conn, &id)?
        .ok_or_else(|| LmsError::Internal("Course not found after insert".to_string()))
}

/// Get course by ID
pub fn get_course(conn: &Connection, id: &str) -> Result<Option<CourseRow>, LmsError> {
    conn.query_row("SELECT * FROM courses WHERE id = ?", params![id], CourseRow::from_row)
        .optional()
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Get course by ID only if `mentor_id` owns it
pub fn get_owned_course(
    conn: &Connection,
    id: &str,
    mentor_id: &str,
) -> Result<Option<CourseRow>, LmsError> {
    conn.query_row(
        "SELECT * FROM courses WHERE id = ? AND mentor_id = ?",
        params![id, mentor_id],
        CourseRow::from_row,
    )
    .optional()
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// List courses owned by a mentor
pub fn list_courses_for_mentor(
    conn: &Connection,
    mentor_id: &str,
) -> Result<Vec<CourseRow>, LmsError> {
    let mut stmt = conn
        .prepare("SELECT * FROM courses WHERE mentor_id = ? ORDER BY created_at")
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let courses = stmt
        .query_map(params![mentor_id], CourseRow::from_row)
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(courses)
}

/// Update title/description of an owned course. Returns None if not owned.
pub fn update_course(
    conn: &Connection,
    id: &str,
    mentor_id: &str,
    input: UpdateCourseInput,
) -> Result<Option<CourseRow>, LmsError> {
    let changes = conn
        .execute(
            r#"
            UPDATE courses
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ? AND mentor_id = ?
            "#,
            params![input.title, input.description, current_timestamp(), id, mentor_id],
        )
        .map_err(|e| LmsError::Internal(format!("Update failed: {}", e)))?;

    if changes == 0 {
        return Ok(None);
    }

    get_course(conn, id)
}

/// Delete an owned course (cascades to chapters, enrollments and progress)
pub fn delete_course(conn: &Connection, id: &str, mentor_id: &str) -> Result<bool, LmsError> {
    let changes = conn
        .execute(
            "DELETE FROM courses WHERE id = ? AND mentor_id = ?",
            params![id, mentor_id],
        )
        .map_err(|e| LmsError::Internal(format!("Delete failed: {}", e)))?;

    Ok(changes > 0)
}

/// Count all courses
pub fn count_courses(conn: &Connection) -> Result<u64, LmsError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
        .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count as u64)
}

/// Create a chapter. A sequence already used in the course is a `Conflict`.
pub fn create_chapter(
    conn: &Connection,
    course_id: &str,
    input: CreateChapterInput,
) -> Result<ChapterRow, LmsError> {
    let id = new_id();

    conn.execute(
        r#"
        INSERT INTO chapters (id, course_id, title, description, image_url, video_url, sequence, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            course_id,
            input.title,
            input.description,
            input.image_url,
            input.video_url,
            input.sequence,
            current_timestamp(),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            LmsError::Conflict("Chapter sequence already exists for this course".into())
        } else {
            LmsError::Internal(format!("Chapter insert failed: {}", e))
        }
    })?;

    get_chapter(conn, &id)?
        .ok_or_else(|| LmsError::Internal("Chapter not found after insert".to_string()))
}

/// Get chapter by ID
pub fn get_chapter(conn: &Connection, id: &str) -> Result<Option<ChapterRow>, LmsError> {
    conn.query_row("SELECT * FROM chapters WHERE id = ?", params![id], ChapterRow::from_row)
        .optional()
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Get all chapters for a course ordered by sequence
pub fn list_chapters(conn: &Connection, course_id: &str) -> Result<Vec<ChapterRow>, LmsError> {
    let mut stmt = conn
        .prepare("SELECT * FROM chapters WHERE course_id = ? ORDER BY sequence")
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let chapters = stmt
        .query_map(params![course_id], ChapterRow::from_row)
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(chapters)
}

/// Count chapters in a course
pub fn count_chapters(conn: &Connection, course_id: &str) -> Result<u64, LmsError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM chapters WHERE course_id = ?",
            params![course_id],
            |row| row.get(0),
        )
        .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count as u64)
}

/// Highest sequence used in a course, if it has chapters
pub fn max_sequence(conn: &Connection, course_id: &str) -> Result<Option<i64>, LmsError> {
    conn.query_row(
        "SELECT MAX(sequence) FROM chapters WHERE course_id = ?",
        params![course_id],
        |row| row.get(0),
    )
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{create_user, NewUser, Role};
    use crate::db::LmsDb;

    fn chapter(title: &str, sequence: i64) -> CreateChapterInput {
        CreateChapterInput {
            title: title.into(),
            description: None,
            image_url: None,
            video_url: None,
            sequence,
        }
    }

    fn setup(conn: &Connection) -> Result<(String, CourseRow), LmsError> {
        let mentor = create_user(
            conn,
            NewUser {
                name: "Grace".into(),
                email: "grace@example.com".into(),
                password_hash: "hash".into(),
                role: Role::Mentor,
                mentor_approved: true,
            },
        )?;
        let course = create_course(
            conn,
            &mentor.id,
            CreateCourseInput {
                title: "Rust 101".into(),
                description: None,
            },
        )?;
        Ok((mentor.id, course))
    }

    #[test]
    fn test_chapters_listed_by_sequence_not_insert_order() {
        let db = LmsDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (_, course) = setup(conn)?;
            create_chapter(conn, &course.id, chapter("third", 30))?;
            create_chapter(conn, &course.id, chapter("first", 1))?;
            create_chapter(conn, &course.id, chapter("second", 7))?;

            let titles: Vec<_> = list_chapters(conn, &course.id)?
                .into_iter()
                .map(|c| c.title)
                .collect();
            assert_eq!(titles, vec!["first", "second", "third"]);
            assert_eq!(max_sequence(conn, &course.id)?, Some(30));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_sequence_is_conflict() {
        let db = LmsDb::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                let (_, course) = setup(conn)?;
                create_chapter(conn, &course.id, chapter("a", 1))?;
                create_chapter(conn, &course.id, chapter("b", 1))
            })
            .unwrap_err();
        assert!(matches!(err, LmsError::Conflict(_)));
    }

    #[test]
    fn test_update_requires_ownership() {
        let db = LmsDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (mentor_id, course) = setup(conn)?;
            let rename = || UpdateCourseInput {
                title: Some("Rust 102".into()),
                description: None,
            };

            assert!(update_course(conn, &course.id, "someone-else", rename())?.is_none());

            let updated = update_course(conn, &course.id, &mentor_id, rename())?.unwrap();
            assert_eq!(updated.title, "Rust 102");
            assert_eq!(updated.mentor_id, mentor_id);
            Ok(())
        })
        .unwrap();
    }
}
