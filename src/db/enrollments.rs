//! Mentor allocation and course assignment (the enrollment ledger)

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{classify_insert, current_timestamp, new_id, InsertOutcome};
use crate::error::LmsError;

/// Assignment row: a student's enrollment in a course
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub created_at: String,
}

impl AssignmentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            course_id: row.get("course_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Student summary as seen by a mentor
#[derive(Debug, Clone, Serialize)]
pub struct AllocatedStudent {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Enrolled course summary as seen by a student
#[derive(Debug, Clone)]
pub struct EnrolledCourse {
    pub course_id: String,
    pub title: String,
}

// ============================================================================
// Mentor allocation
// ============================================================================

/// Allocate a student to a mentor (insert-if-absent)
pub fn allocate_student(
    conn: &Connection,
    mentor_id: &str,
    student_id: &str,
) -> Result<InsertOutcome, LmsError> {
    classify_insert(conn.execute(
        r#"
        INSERT INTO mentor_students (mentor_id, student_id, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT (mentor_id, student_id) DO NOTHING
        "#,
        params![mentor_id, student_id, current_timestamp()],
    ))
}

/// Check whether an admin allocated the student to the mentor
pub fn is_allocated(conn: &Connection, mentor_id: &str, student_id: &str) -> Result<bool, LmsError> {
    conn.query_row(
        "SELECT 1 FROM mentor_students WHERE mentor_id = ? AND student_id = ?",
        params![mentor_id, student_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// List students allocated to a mentor
pub fn list_allocated_students(
    conn: &Connection,
    mentor_id: &str,
) -> Result<Vec<AllocatedStudent>, LmsError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT u.id, u.name, u.email
            FROM mentor_students ms
            JOIN users u ON u.id = ms.student_id
            WHERE ms.mentor_id = ?
            ORDER BY ms.created_at, u.email
            "#,
        )
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let students = stmt
        .query_map(params![mentor_id], student_from_row)
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(students)
}

fn student_from_row(row: &Row) -> Result<AllocatedStudent, rusqlite::Error> {
    Ok(AllocatedStudent {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

// ============================================================================
// Course assignment
// ============================================================================

/// Enroll a student in a course (insert-if-absent), returning the stored row
pub fn assign_course(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<(AssignmentRow, InsertOutcome), LmsError> {
    let outcome = classify_insert(conn.execute(
        r#"
        INSERT INTO assignments (id, student_id, course_id, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
        params![new_id(), student_id, course_id, current_timestamp()],
    ))?;

    let row = get_assignment(conn, student_id, course_id)?
        .ok_or_else(|| LmsError::Internal("Assignment not found after insert".to_string()))?;

    Ok((row, outcome))
}

/// Get the enrollment for (student, course)
pub fn get_assignment(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<Option<AssignmentRow>, LmsError> {
    conn.query_row(
        "SELECT * FROM assignments WHERE student_id = ? AND course_id = ?",
        params![student_id, course_id],
        AssignmentRow::from_row,
    )
    .optional()
    .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Check whether the student is enrolled in the course
pub fn is_enrolled(conn: &Connection, student_id: &str, course_id: &str) -> Result<bool, LmsError> {
    Ok(get_assignment(conn, student_id, course_id)?.is_some())
}

/// Courses a student is enrolled in, in enrollment order
pub fn list_enrolled_courses(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<EnrolledCourse>, LmsError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT c.id, c.title
            FROM assignments a
            JOIN courses c ON c.id = a.course_id
            WHERE a.student_id = ?
            ORDER BY a.created_at, c.title
            "#,
        )
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let courses = stmt
        .query_map(params![student_id], |row| {
            Ok(EnrolledCourse {
                course_id: row.get(0)?,
                title: row.get(1)?,
            })
        })
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(courses)
}

/// Students enrolled in a course
pub fn list_enrolled_students(
    conn: &Connection,
    course_id: &str,
) -> Result<Vec<AllocatedStudent>, LmsError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT u.id, u.name, u.email
            FROM assignments a
            JOIN users u ON u.id = a.student_id
            WHERE a.course_id = ?
            ORDER BY a.created_at, u.email
            "#,
        )
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let students = stmt
        .query_map(params![course_id], student_from_row)
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(students)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::courses::{create_course, CreateCourseInput};
    use crate::db::users::{create_user, NewUser, Role};
    use crate::db::LmsDb;

    fn user(conn: &Connection, email: &str, role: Role) -> String {
        create_user(
            conn,
            NewUser {
                name: email.into(),
                email: email.into(),
                password_hash: "hash".into(),
                role,
                mentor_approved: true,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_allocation_is_idempotent() {
        let db = LmsDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let mentor = user(conn, "m@example.com", Role::Mentor);
            let student = user(conn, "s@example.com", Role::Student);

            assert_eq!(allocate_student(conn, &mentor, &student)?, InsertOutcome::Created);
            assert_eq!(
                allocate_student(conn, &mentor, &student)?,
                InsertOutcome::AlreadyExisted
            );
            assert!(is_allocated(conn, &mentor, &student)?);
            assert_eq!(list_allocated_students(conn, &mentor)?.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_assignment_keeps_first_row() {
        let db = LmsDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let mentor = user(conn, "m@example.com", Role::Mentor);
            let student = user(conn, "s@example.com", Role::Student);
            let course = create_course(
                conn,
                &mentor,
                CreateCourseInput {
                    title: "Course".into(),
                    description: None,
                },
            )?;

            assert!(!is_enrolled(conn, &student, &course.id)?);

            let (first, outcome) = assign_course(conn, &student, &course.id)?;
            assert!(outcome.is_created());
            let (second, outcome) = assign_course(conn, &student, &course.id)?;
            assert_eq!(outcome, InsertOutcome::AlreadyExisted);
            assert_eq!(first.id, second.id);

            assert!(is_enrolled(conn, &student, &course.id)?);
            assert_eq!(list_enrolled_courses(conn, &student)?[0].title, "Course");
            assert_eq!(list_enrolled_students(conn, &course.id)?[0].id, student);
            Ok(())
        })
        .unwrap();
    }
}
