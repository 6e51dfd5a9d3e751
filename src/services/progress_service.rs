//! Progress service - chapter completion for students
//!
//! Each step is its own storage round trip. The prerequisite check and the
//! insert are not atomic as a pair; a lost race shows up as an insert that
//! changed nothing and is reported as already completed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::{courses, enrollments, progress, InsertOutcome, LmsDb};
use crate::error::LmsError;
use crate::sequencer::{self, ChapterView};

use super::events::{EventBus, LmsEvent};

/// Result of a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionResult {
    pub outcome: InsertOutcome,
}

impl CompletionResult {
    /// Message returned to the student
    pub fn message(&self) -> &'static str {
        match self.outcome {
            InsertOutcome::Created => "Chapter completed",
            InsertOutcome::AlreadyExisted => "Chapter already completed",
        }
    }

    pub fn is_first_completion(&self) -> bool {
        self.outcome.is_created()
    }
}

/// Response body for a completion request
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub message: &'static str,
}

impl From<CompletionResult> for CompletionResponse {
    fn from(result: CompletionResult) -> Self {
        Self {
            message: result.message(),
        }
    }
}

pub struct ProgressService {
    db: Arc<LmsDb>,
    events: Arc<EventBus>,
}

impl ProgressService {
    pub fn new(db: Arc<LmsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    fn require_enrollment(&self, student_id: &str, course_id: &str) -> Result<(), LmsError> {
        let enrolled = self
            .db
            .with_conn(|conn| enrollments::is_enrolled(conn, student_id, course_id))?;

        if !enrolled {
            warn!(student = %student_id, course = %course_id, "Access to unassigned course");
            return Err(LmsError::Forbidden("Course not assigned".into()));
        }
        Ok(())
    }

    /// Chapters of a course with completed/locked state for the student
    pub fn list_chapters_for_student(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Vec<ChapterView>, LmsError> {
        self.require_enrollment(student_id, course_id)?;

        let chapters = self
            .db
            .with_conn(|conn| courses::list_chapters(conn, course_id))?;
        let completed = self
            .db
            .with_conn(|conn| progress::completed_chapter_ids(conn, student_id, course_id))?;

        Ok(sequencer::derive_chapter_views(chapters, &completed))
    }

    /// Mark a chapter completed for the student.
    ///
    /// Calling this again for a completed chapter succeeds with
    /// `AlreadyExisted`. A rejected call writes nothing.
    pub fn complete_chapter(
        &self,
        student_id: &str,
        chapter_id: &str,
    ) -> Result<CompletionResult, LmsError> {
        let chapter = self
            .db
            .with_conn(|conn| courses::get_chapter(conn, chapter_id))?
            .ok_or_else(|| LmsError::NotFound("Chapter not found".into()))?;

        self.require_enrollment(student_id, &chapter.course_id)?;

        let chapters = self
            .db
            .with_conn(|conn| courses::list_chapters(conn, &chapter.course_id))?;
        let position = sequencer::locate_chapter(chapters, chapter_id)?;

        if let Some(previous_id) = &position.previous_id {
            let previous_done = self
                .db
                .with_conn(|conn| progress::has_completion(conn, student_id, previous_id))?;

            if !previous_done {
                debug!(
                    student = %student_id,
                    chapter = %chapter_id,
                    previous = %previous_id,
                    "Completion rejected, previous chapter open"
                );
                return Err(LmsError::PrerequisiteNotMet(
                    "Previous chapter not completed".into(),
                ));
            }
        }

        let outcome = self.db.with_conn(|conn| {
            progress::insert_completion(conn, student_id, &chapter.course_id, chapter_id)
        })?;

        if outcome.is_created() {
            self.events.emit(LmsEvent::ChapterCompleted {
                student_id: student_id.to_string(),
                course_id: chapter.course_id.clone(),
                chapter_id: chapter_id.to_string(),
            });
        }

        Ok(CompletionResult { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{courses::CreateChapterInput, courses::CreateCourseInput, users, NewUser, Role};

    struct Fixture {
        service: ProgressService,
        db: Arc<LmsDb>,
        student: String,
        course: String,
        chapters: Vec<String>,
    }

    fn user(db: &LmsDb, email: &str, role: Role) -> String {
        db.with_conn(|conn| {
            users::create_user(
                conn,
                NewUser {
                    name: email.into(),
                    email: email.into(),
                    password_hash: "x".into(),
                    role,
                    mentor_approved: role == Role::Mentor,
                },
            )
        })
        .unwrap()
        .id
    }

    fn setup(sequences: &[i64], enroll: bool) -> Fixture {
        let db = Arc::new(LmsDb::open_in_memory().unwrap());
        let mentor = user(&db, "m@test", Role::Mentor);
        let student = user(&db, "s@test", Role::Student);

        let course = db
            .with_conn(|conn| {
                courses::create_course(
                    conn,
                    &mentor,
                    CreateCourseInput {
                        title: "Rust".into(),
                        description: None,
                    },
                )
            })
            .unwrap()
            .id;

        let chapters = sequences
            .iter()
            .map(|&sequence| {
                db.with_conn(|conn| {
                    courses::create_chapter(
                        conn,
                        &course,
                        CreateChapterInput {
                            title: format!("Chapter {}", sequence),
                            description: None,
                            image_url: None,
                            video_url: None,
                            sequence,
                        },
                    )
                })
                .unwrap()
                .id
            })
            .collect();

        if enroll {
            db.with_conn(|conn| enrollments::assign_course(conn, &student, &course))
                .unwrap();
        }

        Fixture {
            service: ProgressService::new(db.clone(), Arc::new(EventBus::new())),
            db,
            student,
            course,
            chapters,
        }
    }

    #[test]
    fn test_first_chapter_needs_no_prerequisite() {
        let f = setup(&[10, 20], true);
        let result = f.service.complete_chapter(&f.student, &f.chapters[0]).unwrap();
        assert_eq!(result.message(), "Chapter completed");
    }

    #[test]
    fn test_out_of_order_completion_rejected() {
        let f = setup(&[1, 2, 3], true);
        let err = f.service.complete_chapter(&f.student, &f.chapters[1]).unwrap_err();
        assert!(matches!(err, LmsError::PrerequisiteNotMet(_)));

        let count = f
            .db
            .with_conn(|conn| progress::count_completions(conn, &f.student, &f.course))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_repeat_completion_is_idempotent() {
        let f = setup(&[1], true);
        let first = f.service.complete_chapter(&f.student, &f.chapters[0]).unwrap();
        let second = f.service.complete_chapter(&f.student, &f.chapters[0]).unwrap();

        assert!(first.is_first_completion());
        assert_eq!(second.message(), "Chapter already completed");
    }

    #[test]
    fn test_unknown_chapter() {
        let f = setup(&[1], true);
        let err = f.service.complete_chapter(&f.student, "missing").unwrap_err();
        assert!(matches!(err, LmsError::NotFound(_)));
    }

    #[test]
    fn test_not_enrolled() {
        let f = setup(&[1], false);
        assert!(matches!(
            f.service.complete_chapter(&f.student, &f.chapters[0]),
            Err(LmsError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.list_chapters_for_student(&f.student, &f.course),
            Err(LmsError::Forbidden(_))
        ));
    }

    #[test]
    fn test_list_reflects_completion() {
        let f = setup(&[1, 2, 3], true);
        f.service.complete_chapter(&f.student, &f.chapters[0]).unwrap();

        let views = f.service.list_chapters_for_student(&f.student, &f.course).unwrap();
        assert!(views[0].completed);
        assert!(!views[1].locked && !views[1].completed);
        assert!(views[2].locked);
    }
}
