//! Course service - mentor authoring and assignment
//!
//! Owns the chapter sequence policy: once any student has completed a chapter
//! of a course, new chapters may only be appended after the last one.

use std::sync::Arc;

use rusqlite::TransactionBehavior;
use tracing::{info, warn};

use crate::db::{
    courses, enrollments, progress, users, AllocatedStudent, AssignmentRow, ChapterRow,
    CourseRow, CreateChapterInput, CreateCourseInput, LmsDb, Role, UpdateCourseInput,
};
use crate::error::LmsError;

use super::events::{EventBus, LmsEvent};

pub struct CourseService {
    db: Arc<LmsDb>,
    events: Arc<EventBus>,
}

impl CourseService {
    pub fn new(db: Arc<LmsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    fn owned_course(&self, mentor_id: &str, course_id: &str) -> Result<CourseRow, LmsError> {
        self.db
            .with_conn(|conn| courses::get_owned_course(conn, course_id, mentor_id))?
            .ok_or_else(|| LmsError::NotFound("Course not found".into()))
    }

    // =========================================================================
    // Courses
    // =========================================================================

    pub fn create_course(
        &self,
        mentor_id: &str,
        mut input: CreateCourseInput,
    ) -> Result<CourseRow, LmsError> {
        input.title = input.title.trim().to_string();
        if input.title.is_empty() {
            return Err(LmsError::InvalidInput("Course title is required".into()));
        }

        let course = self
            .db
            .with_conn(|conn| courses::create_course(conn, mentor_id, input))?;

        self.events.emit(LmsEvent::CourseCreated {
            id: course.id.clone(),
            title: course.title.clone(),
        });

        Ok(course)
    }

    pub fn list_my_courses(&self, mentor_id: &str) -> Result<Vec<CourseRow>, LmsError> {
        self.db
            .with_conn(|conn| courses::list_courses_for_mentor(conn, mentor_id))
    }

    pub fn update_course(
        &self,
        mentor_id: &str,
        course_id: &str,
        input: UpdateCourseInput,
    ) -> Result<CourseRow, LmsError> {
        if matches!(&input.title, Some(t) if t.trim().is_empty()) {
            return Err(LmsError::InvalidInput("Course title cannot be empty".into()));
        }

        let course = self
            .db
            .with_conn(|conn| courses::update_course(conn, course_id, mentor_id, input))?
            .ok_or_else(|| LmsError::NotFound("Course not found".into()))?;

        self.events.emit(LmsEvent::CourseUpdated {
            id: course.id.clone(),
        });

        Ok(course)
    }

    pub fn delete_course(&self, mentor_id: &str, course_id: &str) -> Result<(), LmsError> {
        let deleted = self
            .db
            .with_conn(|conn| courses::delete_course(conn, course_id, mentor_id))?;

        if !deleted {
            return Err(LmsError::NotFound("Course not found".into()));
        }

        info!(course = %course_id, "Course deleted");
        self.events.emit(LmsEvent::CourseDeleted {
            id: course_id.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Chapters
    // =========================================================================

    /// Add a chapter to an owned course.
    ///
    /// A sequence already used in the course is a `Conflict`. After the first
    /// completion in the course, a sequence at or below the current maximum is
    /// also a `Conflict`.
    pub fn add_chapter(
        &self,
        mentor_id: &str,
        course_id: &str,
        mut input: CreateChapterInput,
    ) -> Result<ChapterRow, LmsError> {
        input.title = input.title.trim().to_string();
        if input.title.is_empty() {
            return Err(LmsError::InvalidInput("Chapter title is required".into()));
        }

        self.owned_course(mentor_id, course_id)?;

        // Completions arriving between the policy check and the insert would
        // slip past it, so both run under one write lock.
        let chapter = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if progress::count_course_completions(&tx, course_id)? > 0 {
                if let Some(max) = courses::max_sequence(&tx, course_id)? {
                    if input.sequence <= max {
                        return Err(LmsError::Conflict(format!(
                            "Students have started this course; new chapters need a sequence above {}",
                            max
                        )));
                    }
                }
            }

            let chapter = courses::create_chapter(&tx, course_id, input)?;
            tx.commit()?;
            Ok(chapter)
        })?;

        self.events.emit(LmsEvent::ChapterAdded {
            id: chapter.id.clone(),
            course_id: course_id.to_string(),
            sequence: chapter.sequence,
        });

        Ok(chapter)
    }

    /// Chapters of an owned course in sequence order
    pub fn list_chapters(&self, mentor_id: &str, course_id: &str) -> Result<Vec<ChapterRow>, LmsError> {
        self.owned_course(mentor_id, course_id)?;
        self.db.with_conn(|conn| courses::list_chapters(conn, course_id))
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Enroll a student in an owned course.
    ///
    /// The student must have been allocated to this mentor. Assigning twice
    /// returns the existing assignment.
    pub fn assign_course(
        &self,
        mentor_id: &str,
        course_id: &str,
        student_id: &str,
    ) -> Result<AssignmentRow, LmsError> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(LmsError::InvalidInput("studentId is required".into()));
        }

        self.db
            .with_conn(|conn| users::get_user_with_role(conn, student_id, Role::Student))?
            .ok_or_else(|| LmsError::NotFound("Student not found".into()))?;

        let allocated = self
            .db
            .with_conn(|conn| enrollments::is_allocated(conn, mentor_id, student_id))?;
        if !allocated {
            warn!(mentor = %mentor_id, student = %student_id, "Assignment to unallocated student");
            return Err(LmsError::Forbidden(
                "You can assign courses only to students allocated to you".into(),
            ));
        }

        self.owned_course(mentor_id, course_id)?;

        let (assignment, outcome) = self
            .db
            .with_conn(|conn| enrollments::assign_course(conn, student_id, course_id))?;

        if outcome.is_created() {
            self.events.emit(LmsEvent::CourseAssigned {
                course_id: course_id.to_string(),
                student_id: student_id.to_string(),
            });
        }

        Ok(assignment)
    }

    /// Students an admin allocated to this mentor
    pub fn my_students(&self, mentor_id: &str) -> Result<Vec<AllocatedStudent>, LmsError> {
        self.db
            .with_conn(|conn| enrollments::list_allocated_students(conn, mentor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    fn user(db: &LmsDb, email: &str, role: Role) -> String {
        db.with_conn(|conn| {
            users::create_user(
                conn,
                NewUser {
                    name: email.into(),
                    email: email.into(),
                    password_hash: "x".into(),
                    role,
                    mentor_approved: true,
                },
            )
        })
        .unwrap()
        .id
    }

    fn chapter(title: &str, sequence: i64) -> CreateChapterInput {
        CreateChapterInput {
            title: title.into(),
            description: None,
            image_url: None,
            video_url: None,
            sequence,
        }
    }

    fn setup() -> (CourseService, Arc<LmsDb>, String, String) {
        let db = Arc::new(LmsDb::open_in_memory().unwrap());
        let mentor = user(&db, "m@test", Role::Mentor);
        let service = CourseService::new(db.clone(), Arc::new(EventBus::new()));
        let course = service
            .create_course(
                &mentor,
                CreateCourseInput {
                    title: "Rust".into(),
                    description: None,
                },
            )
            .unwrap()
            .id;
        (service, db, mentor, course)
    }

    #[test]
    fn test_duplicate_sequence_conflict() {
        let (service, _db, mentor, course) = setup();
        service.add_chapter(&mentor, &course, chapter("One", 1)).unwrap();

        let err = service
            .add_chapter(&mentor, &course, chapter("Again", 1))
            .unwrap_err();
        assert!(matches!(err, LmsError::Conflict(_)));
    }

    #[test]
    fn test_insert_before_existing_blocked_after_first_completion() {
        let (service, db, mentor, course) = setup();
        let student = user(&db, "s@test", Role::Student);
        let first = service.add_chapter(&mentor, &course, chapter("One", 10)).unwrap();
        service.add_chapter(&mentor, &course, chapter("Two", 20)).unwrap();

        // Gaps may be filled before anyone has started
        service.add_chapter(&mentor, &course, chapter("Between", 15)).unwrap();

        db.with_conn(|conn| progress::insert_completion(conn, &student, &course, &first.id))
            .unwrap();

        let err = service
            .add_chapter(&mentor, &course, chapter("Early", 5))
            .unwrap_err();
        assert!(matches!(err, LmsError::Conflict(_)));

        service.add_chapter(&mentor, &course, chapter("Last", 30)).unwrap();
    }

    #[test]
    fn test_other_mentor_cannot_touch_course() {
        let (service, db, _mentor, course) = setup();
        let other = user(&db, "other@test", Role::Mentor);

        assert!(matches!(
            service.add_chapter(&other, &course, chapter("X", 1)),
            Err(LmsError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_course(&other, &course),
            Err(LmsError::NotFound(_))
        ));
    }

    #[test]
    fn test_assign_requires_allocation() {
        let (service, db, mentor, course) = setup();
        let student = user(&db, "s@test", Role::Student);

        let err = service.assign_course(&mentor, &course, &student).unwrap_err();
        assert!(matches!(err, LmsError::Forbidden(_)));

        db.with_conn(|conn| enrollments::allocate_student(conn, &mentor, &student))
            .unwrap();
        let first = service.assign_course(&mentor, &course, &student).unwrap();
        let again = service.assign_course(&mentor, &course, &student).unwrap();
        assert_eq!(first.id, again.id);
    }

    #[test]
    fn test_empty_title_rejected() {
        let (service, _db, mentor, _course) = setup();
        let err = service
            .create_course(
                &mentor,
                CreateCourseInput {
                    title: "   ".into(),
                    description: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LmsError::InvalidInput(_)));
    }
}
