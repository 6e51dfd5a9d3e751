//! Certificate rendering sinks
//!
//! The certificate issuer assembles a [`CertificateRecord`] and hands it to a
//! [`CertificateRenderer`]. Layout and file format belong to the renderer.

use serde::Serialize;

use crate::error::LmsError;

/// Everything a renderer needs to draw a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub student_name: String,
    pub course_title: String,
    pub mentor_name: String,
    /// Human-readable issue date, e.g. "Fri Oct 16 2026"
    pub issued_date: String,
    /// Short identifier printed on the certificate
    pub certificate_id: String,
}

/// Turns a certificate record into a downloadable artifact
pub trait CertificateRenderer: Send + Sync {
    /// MIME type of the rendered bytes
    fn content_type(&self) -> &'static str;

    /// File extension without the dot
    fn file_extension(&self) -> &'static str;

    fn render(&self, record: &CertificateRecord) -> Result<Vec<u8>, LmsError>;
}

/// Plain-text certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCertificateRenderer;

impl CertificateRenderer for TextCertificateRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, record: &CertificateRecord) -> Result<Vec<u8>, LmsError> {
        let text = format!(
            "CERTIFICATE OF COMPLETION\n\
             \n\
             This certifies that\n\
             \n\
             {student}\n\
             \n\
             has successfully completed the internship course\n\
             \n\
             {course}\n\
             \n\
             Mentor: {mentor}\n\
             Issued on: {date}\n\
             Certificate ID: {id}\n",
            student = record.student_name,
            course = record.course_title,
            mentor = record.mentor_name,
            date = record.issued_date,
            id = record.certificate_id,
        );
        Ok(text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_renderer_includes_record_fields() {
        let record = CertificateRecord {
            student_name: "Ada".into(),
            course_title: "Systems".into(),
            mentor_name: "Grace".into(),
            issued_date: "Fri Oct 16 2026".into(),
            certificate_id: "1A2B3C4D".into(),
        };

        let bytes = TextCertificateRenderer.render(&record).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("Ada"));
        assert!(text.contains("Systems"));
        assert!(text.contains("Mentor: Grace"));
        assert!(text.contains("Certificate ID: 1A2B3C4D"));
    }
}
