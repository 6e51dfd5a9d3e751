//! Certificate service - eligibility gate and idempotent issuance

use std::sync::Arc;

use chrono::DateTime;
use tracing::debug;

use crate::db::{certificates, courses, progress, users, CertificateRow, LmsDb};
use crate::error::LmsError;
use crate::render::{CertificateRecord, CertificateRenderer};

use super::events::{EventBus, LmsEvent};

/// Length of the printed certificate identifier
const SHORT_ID_LEN: usize = 8;

/// Short, stable identifier derived from a certificate's id
pub fn short_certificate_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(SHORT_ID_LEN);
    chars[start..].iter().collect::<String>().to_uppercase()
}

/// Format a stored timestamp as e.g. "Fri Oct 16 2026"
fn issued_date(issued_at: &str) -> String {
    DateTime::parse_from_rfc3339(issued_at)
        .map(|dt| dt.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|_| issued_at.to_string())
}

/// Keep a course title usable inside a Content-Disposition header
fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A certificate ready to be sent to the student
#[derive(Debug, Clone)]
pub struct CertificateDownload {
    pub certificate: CertificateRow,
    pub record: CertificateRecord,
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub struct CertificateService {
    db: Arc<LmsDb>,
    events: Arc<EventBus>,
    renderer: Arc<dyn CertificateRenderer>,
}

impl CertificateService {
    pub fn new(
        db: Arc<LmsDb>,
        events: Arc<EventBus>,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> Self {
        Self {
            db,
            events,
            renderer,
        }
    }

    /// Fetch or create the certificate record for a fully completed course.
    ///
    /// Counts are read fresh. Eligibility is exact equality of completed and
    /// total chapters with at least one chapter.
    pub fn issue(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<(CertificateRow, CertificateRecord), LmsError> {
        let course = self
            .db
            .with_conn(|conn| courses::get_course(conn, course_id))?
            .ok_or_else(|| LmsError::NotFound("Course not found".into()))?;

        let (completed, total) = self.db.with_conn(|conn| {
            Ok((
                progress::count_completions(conn, student_id, course_id)?,
                courses::count_chapters(conn, course_id)?,
            ))
        })?;

        if total == 0 || completed != total {
            debug!(
                student = %student_id,
                course = %course_id,
                completed,
                total,
                "Certificate requested before completion"
            );
            return Err(LmsError::NotEligible("Course not fully completed".into()));
        }

        let (certificate, outcome) = self
            .db
            .with_conn(|conn| certificates::get_or_create_certificate(conn, student_id, course_id))?;

        let certificate_id = short_certificate_id(&certificate.id);

        if outcome.is_created() {
            self.events.emit(LmsEvent::CertificateIssued {
                student_id: student_id.to_string(),
                course_id: course_id.to_string(),
                certificate_id: certificate_id.clone(),
            });
        }

        let (student_name, mentor_name) = self.db.with_conn(|conn| {
            let student = users::get_user(conn, student_id)?;
            let mentor = users::get_user(conn, &course.mentor_id)?;
            Ok((student.map(|u| u.name), mentor.map(|u| u.name)))
        })?;

        let record = CertificateRecord {
            student_name: student_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Student".to_string()),
            course_title: course.title,
            mentor_name: mentor_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            issued_date: issued_date(&certificate.issued_at),
            certificate_id,
        };

        Ok((certificate, record))
    }

    /// Issue (or re-fetch) the certificate and render it
    pub fn download(&self, student_id: &str, course_id: &str) -> Result<CertificateDownload, LmsError> {
        let (certificate, record) = self.issue(student_id, course_id)?;
        let bytes = self.renderer.render(&record)?;

        Ok(CertificateDownload {
            filename: format!(
                "certificate-{}.{}",
                sanitize_filename(&record.course_title),
                self.renderer.file_extension()
            ),
            content_type: self.renderer.content_type(),
            certificate,
            record,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_certificate_id() {
        assert_eq!(
            short_certificate_id("550e8400-e29b-41d4-a716-446655440000"),
            "55440000"
        );
        assert_eq!(short_certificate_id("abcdef0123456789"), "23456789");
        assert_eq!(short_certificate_id("abc"), "ABC");
    }

    #[test]
    fn test_short_id_uppercases() {
        assert_eq!(short_certificate_id("0000-deadbeef"), "DEADBEEF");
    }

    #[test]
    fn test_issued_date_format() {
        assert_eq!(issued_date("2026-10-16T08:30:00.000Z"), "Fri Oct 16 2026");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Rust 101"), "Rust 101");
        assert_eq!(sanitize_filename("A \"quoted\"\ntitle"), "A _quoted__title");
    }
}
