//! Completion percentages
//!
//! Percentages are never stored. Every read recomputes them from the current
//! completion facts and chapter counts.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{courses, enrollments, progress, LmsDb};
use crate::error::LmsError;

/// Rounded completion percentage, half up. A course without chapters is 0%.
pub fn completion_percentage(completed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed * 100 + total / 2) / total) as u32
}

/// A student's progress in one enrolled course
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub title: String,
    pub completion_percentage: u32,
}

/// One assigned student's progress, as seen by the course mentor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub completion_percentage: u32,
}

pub struct CompletionService {
    db: Arc<LmsDb>,
}

impl CompletionService {
    pub fn new(db: Arc<LmsDb>) -> Self {
        Self { db }
    }

    /// Percentage for one (student, course) pair
    pub fn percentage(&self, student_id: &str, course_id: &str) -> Result<u32, LmsError> {
        self.db.with_conn(|conn| {
            let total = courses::count_chapters(conn, course_id)?;
            let completed = progress::count_completions(conn, student_id, course_id)?;
            Ok(completion_percentage(completed, total))
        })
    }

    /// One entry per enrollment of the student, 0% entries included
    pub fn my_progress(&self, student_id: &str) -> Result<Vec<CourseProgress>, LmsError> {
        let enrolled = self
            .db
            .with_conn(|conn| enrollments::list_enrolled_courses(conn, student_id))?;

        enrolled
            .into_iter()
            .map(|course| {
                Ok(CourseProgress {
                    completion_percentage: self.percentage(student_id, &course.course_id)?,
                    course_id: course.course_id,
                    title: course.title,
                })
            })
            .collect()
    }

    /// Progress of every student assigned to a course owned by the mentor
    pub fn course_progress(
        &self,
        mentor_id: &str,
        course_id: &str,
    ) -> Result<Vec<StudentProgress>, LmsError> {
        self.db.with_conn(|conn| {
            courses::get_owned_course(conn, course_id, mentor_id)?
                .ok_or_else(|| LmsError::NotFound("Course not found".into()))?;

            let total = courses::count_chapters(conn, course_id)?;
            let students = enrollments::list_enrolled_students(conn, course_id)?;
            let counts = progress::completion_counts_by_student(conn, course_id)?;

            Ok(students
                .into_iter()
                .map(|student| {
                    let completed = counts.get(&student.id).copied().unwrap_or(0);
                    StudentProgress {
                        completion_percentage: completion_percentage(completed, total),
                        student_id: student.id,
                        name: student.name,
                        email: student.email,
                    }
                })
                .collect())
        })
    }
}
