//! Admin service - user management, allocation and platform counts

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::db::{certificates, courses, enrollments, users, LmsDb, Role, UserRow};
use crate::error::LmsError;

use super::events::{EventBus, LmsEvent};

/// Platform-wide counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_users: u64,
    pub total_students: u64,
    pub total_mentors: u64,
    pub total_admins: u64,
    pub total_courses: u64,
    pub total_certificates: u64,
}

pub struct AdminService {
    db: Arc<LmsDb>,
    events: Arc<EventBus>,
}

impl AdminService {
    pub fn new(db: Arc<LmsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>, LmsError> {
        self.db.with_conn(users::list_users)
    }

    pub fn approve_mentor(&self, mentor_id: &str) -> Result<(), LmsError> {
        let approved = self
            .db
            .with_conn(|conn| users::approve_mentor(conn, mentor_id))?;

        if !approved {
            return Err(LmsError::NotFound("Mentor not found".into()));
        }

        info!(mentor = %mentor_id, "Mentor approved");
        self.events.emit(LmsEvent::MentorApproved {
            id: mentor_id.to_string(),
        });
        Ok(())
    }

    pub fn delete_user(&self, user_id: &str) -> Result<(), LmsError> {
        let deleted = self.db.with_conn(|conn| users::delete_user(conn, user_id))?;

        if !deleted {
            return Err(LmsError::NotFound("User not found".into()));
        }

        info!(user = %user_id, "User deleted");
        self.events.emit(LmsEvent::UserDeleted {
            id: user_id.to_string(),
        });
        Ok(())
    }

    /// Allocate a student to a mentor. Repeating an allocation is a no-op.
    pub fn allocate_student(&self, mentor_id: &str, student_id: &str) -> Result<(), LmsError> {
        let outcome = self.db.with_conn(|conn| {
            users::get_user_with_role(conn, mentor_id, Role::Mentor)?
                .ok_or_else(|| LmsError::NotFound("Mentor not found".into()))?;
            users::get_user_with_role(conn, student_id, Role::Student)?
                .ok_or_else(|| LmsError::NotFound("Student not found".into()))?;

            enrollments::allocate_student(conn, mentor_id, student_id)
        })?;

        if outcome.is_created() {
            self.events.emit(LmsEvent::StudentAllocated {
                mentor_id: mentor_id.to_string(),
                student_id: student_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn analytics(&self) -> Result<Analytics, LmsError> {
        self.db.with_conn(|conn| {
            Ok(Analytics {
                total_users: users::count_users(conn, None)?,
                total_students: users::count_users(conn, Some(Role::Student))?,
                total_mentors: users::count_users(conn, Some(Role::Mentor))?,
                total_admins: users::count_users(conn, Some(Role::Admin))?,
                total_courses: courses::count_courses(conn)?,
                total_certificates: certificates::count_certificates(conn)?,
            })
        })
    }
}
