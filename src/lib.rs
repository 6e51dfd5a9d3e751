//! Internship LMS - course progress, sequential unlocks and certificates
//!
//! Admins approve mentors and allocate students to them. Mentors author
//! courses made of ordered chapters and assign them to their students.
//! Students complete chapters strictly in sequence and download a certificate
//! once every chapter of a course is done.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/internship-lms/
//! ├── lms.db           # SQLite database (WAL mode)
//! └── config.toml      # Configuration
//! ```
//!
//! ## Consistency
//!
//! Completion facts and certificates are append-only and guarded by UNIQUE
//! constraints. Concurrent duplicate requests resolve to "already completed"
//! or to the existing certificate; neither surfaces as an error.

pub mod config;
pub mod error;
pub mod db;
pub mod auth;
pub mod sequencer;
pub mod render;
pub mod services;
pub mod http;

pub use config::Config;
pub use db::{InsertOutcome, LmsDb};
pub use error::LmsError;
pub use http::HttpServer;
pub use render::{CertificateRecord, CertificateRenderer, TextCertificateRenderer};
pub use services::Services;
