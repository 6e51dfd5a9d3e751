//! Service layer for internship-lms
//!
//! Services sit between HTTP handlers and repositories. Each one wraps
//! database operations with:
//! - Input validation
//! - Ownership, allocation and enrollment checks
//! - Event emission for audit logging
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin, role checks)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod account_service;
pub mod admin_service;
pub mod course_service;
pub mod progress_service;
pub mod completion_service;
pub mod certificate_service;

// Re-exports
pub use response::*;
pub use events::{spawn_logging_listener, EventBus, EventListener, LmsEvent};
pub use account_service::{AccountService, LoginRequest, LoginResponse, RegisterRequest};
pub use admin_service::{AdminService, Analytics};
pub use course_service::CourseService;
pub use progress_service::{CompletionResponse, CompletionResult, ProgressService};
pub use completion_service::{completion_percentage, CompletionService, CourseProgress, StudentProgress};
pub use certificate_service::{short_certificate_id, CertificateDownload, CertificateService};

use std::sync::Arc;

use crate::auth::JwtValidator;
use crate::db::LmsDb;
use crate::render::{CertificateRenderer, TextCertificateRenderer};

/// Service container for dependency injection
///
/// Holds all services with a shared database handle and event bus.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub admin: Arc<AdminService>,
    pub courses: Arc<CourseService>,
    pub progress: Arc<ProgressService>,
    pub completion: Arc<CompletionService>,
    pub certificates: Arc<CertificateService>,
    pub events: Arc<EventBus>,
    pub db: Arc<LmsDb>,
}

impl Services {
    /// Create all services with the plain-text certificate renderer
    pub fn new(db: Arc<LmsDb>, jwt: JwtValidator, bootstrap_token: Option<String>) -> Self {
        Self::with_renderer(db, jwt, bootstrap_token, Arc::new(TextCertificateRenderer))
    }

    /// Create all services with a custom certificate renderer
    pub fn with_renderer(
        db: Arc<LmsDb>,
        jwt: JwtValidator,
        bootstrap_token: Option<String>,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            accounts: Arc::new(AccountService::new(
                db.clone(),
                events.clone(),
                jwt,
                bootstrap_token,
            )),
            admin: Arc::new(AdminService::new(db.clone(), events.clone())),
            courses: Arc::new(CourseService::new(db.clone(), events.clone())),
            progress: Arc::new(ProgressService::new(db.clone(), events.clone())),
            completion: Arc::new(CompletionService::new(db.clone())),
            certificates: Arc::new(CertificateService::new(db.clone(), events.clone(), renderer)),
            events,
            db,
        }
    }
}
