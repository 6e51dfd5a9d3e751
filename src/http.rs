//! HTTP API for the internship LMS
//!
//! ## Auth
//! - `POST /api/auth/register` - Register a student
//! - `POST /api/auth/register-mentor` - Register a mentor (needs approval)
//! - `POST /api/auth/login` - Exchange credentials for a bearer token
//! - `POST /api/auth/bootstrap-admin` - Create the first admin (`x-bootstrap-token`)
//!
//! ## Admin
//! - `GET /api/admin/users`
//! - `PUT /api/admin/users/{id}/approve-mentor`
//! - `DELETE /api/admin/users/{id}`
//! - `POST /api/admin/mentors/{mentorId}/allocate-student`
//! - `GET /api/admin/analytics`
//!
//! ## Mentor
//! - `POST /api/mentor/courses`, `GET /api/mentor/courses/my`
//! - `PUT|DELETE /api/mentor/courses/{id}`
//! - `POST|GET /api/mentor/courses/{id}/chapters`
//! - `POST /api/mentor/courses/{id}/assign`
//! - `GET /api/mentor/courses/{id}/progress`
//! - `GET /api/mentor/students/my`
//!
//! ## Student
//! - `GET /api/student/courses/{courseId}/chapters`
//! - `POST /api/student/progress/{chapterId}/complete`
//! - `GET /api/student/progress/my`
//! - `GET /api/certificates/{courseId}`
//!
//! ## Example Usage
//!
//! ```bash
//! TOKEN=$(curl -s -X POST http://localhost:5001/api/auth/login \
//!      -H "Content-Type: application/json" \
//!      -d '{"email":"ada@example.com","password":"secret"}' | jq -r .token)
//!
//! curl -X POST -H "Authorization: Bearer $TOKEN" \
//!      http://localhost:5001/api/student/progress/$CHAPTER/complete
//! ```

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::auth::{extract_token_from_header, Principal};
use crate::db::{current_timestamp, CreateChapterInput, CreateCourseInput, Role, UpdateCourseInput};
use crate::error::LmsError;
use crate::services::{self, CompletionResponse, LoginRequest, RegisterRequest, Services};

type HttpResponse = Response<Full<Bytes>>;

/// Header carrying the one-time admin bootstrap secret
const BOOTSTRAP_HEADER: &str = "x-bootstrap-token";

/// Body of allocate/assign requests
#[derive(Debug, Deserialize)]
struct StudentRef {
    #[serde(rename = "studentId", default)]
    student_id: String,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), LmsError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, hyper::Error>(server.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Handle one request. Errors become `{ "message": ... }` responses.
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!(method = %method, path = %path, "Incoming request");

        match self.route(req, &method, &path).await {
            Ok(response) => response,
            Err(err) => {
                if !err.is_internal() {
                    debug!(method = %method, path = %path, error = %err, "Request rejected");
                }
                services::error_response(err)
            }
        }
    }

    /// Route requests to handlers
    async fn route<B>(
        &self,
        req: Request<B>,
        method: &Method,
        path: &str,
    ) -> Result<HttpResponse, LmsError>
    where
        B: Body,
        B::Error: Display,
    {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let s = &self.services;

        match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) => Ok(services::ok(&serde_json::json!({
                "ok": true,
                "time": current_timestamp(),
            }))),

            // Auth
            (&Method::POST, ["api", "auth", "register"]) => {
                let body: RegisterRequest = read_json(req).await?;
                s.accounts.register_student(body)?;
                Ok(created_message("Student registered successfully. You can now sign in."))
            }
            (&Method::POST, ["api", "auth", "register-mentor"]) => {
                let body: RegisterRequest = read_json(req).await?;
                s.accounts.register_mentor(body)?;
                Ok(created_message("Mentor registered. Awaiting admin approval."))
            }
            (&Method::POST, ["api", "auth", "login"]) => {
                let body: LoginRequest = read_json(req).await?;
                Ok(services::ok(&s.accounts.login(body)?))
            }
            (&Method::POST, ["api", "auth", "bootstrap-admin"]) => {
                let provided = req
                    .headers()
                    .get(BOOTSTRAP_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body: RegisterRequest = read_json(req).await?;
                s.accounts.bootstrap_admin(provided.as_deref(), body)?;
                Ok(created_message("Admin created successfully."))
            }

            // Admin
            (&Method::GET, ["api", "admin", "users"]) => {
                self.authenticate(&req, Role::Admin)?;
                Ok(services::ok(&s.admin.list_users()?))
            }
            (&Method::PUT, ["api", "admin", "users", id, "approve-mentor"]) => {
                self.authenticate(&req, Role::Admin)?;
                s.admin.approve_mentor(id)?;
                Ok(ok_message("Mentor approved"))
            }
            (&Method::DELETE, ["api", "admin", "users", id]) => {
                self.authenticate(&req, Role::Admin)?;
                s.admin.delete_user(id)?;
                Ok(ok_message("User deleted"))
            }
            (&Method::POST, ["api", "admin", "mentors", mentor_id, "allocate-student"]) => {
                self.authenticate(&req, Role::Admin)?;
                let body: StudentRef = read_json(req).await?;
                s.admin.allocate_student(mentor_id, &body.student_id)?;
                Ok(created_message("Student allocated to mentor"))
            }
            (&Method::GET, ["api", "admin", "analytics"]) => {
                self.authenticate(&req, Role::Admin)?;
                Ok(services::ok(&s.admin.analytics()?))
            }

            // Mentor
            (&Method::POST, ["api", "mentor", "courses"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                let body: CreateCourseInput = read_json(req).await?;
                Ok(services::created(&s.courses.create_course(&mentor.id, body)?))
            }
            (&Method::GET, ["api", "mentor", "courses", "my"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                Ok(services::ok(&s.courses.list_my_courses(&mentor.id)?))
            }
            (&Method::PUT, ["api", "mentor", "courses", id]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                let body: UpdateCourseInput = read_json(req).await?;
                Ok(services::ok(&s.courses.update_course(&mentor.id, id, body)?))
            }
            (&Method::DELETE, ["api", "mentor", "courses", id]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                s.courses.delete_course(&mentor.id, id)?;
                Ok(ok_message("Course deleted"))
            }
            (&Method::POST, ["api", "mentor", "courses", id, "chapters"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                let body: CreateChapterInput = read_json(req).await?;
                Ok(services::created(&s.courses.add_chapter(&mentor.id, id, body)?))
            }
            (&Method::GET, ["api", "mentor", "courses", id, "chapters"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                Ok(services::ok(&s.courses.list_chapters(&mentor.id, id)?))
            }
            (&Method::POST, ["api", "mentor", "courses", id, "assign"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                let body: StudentRef = read_json(req).await?;
                Ok(services::created(
                    &s.courses.assign_course(&mentor.id, id, &body.student_id)?,
                ))
            }
            (&Method::GET, ["api", "mentor", "courses", id, "progress"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                Ok(services::ok(&s.completion.course_progress(&mentor.id, id)?))
            }
            (&Method::GET, ["api", "mentor", "students", "my"]) => {
                let mentor = self.authenticate(&req, Role::Mentor)?;
                Ok(services::ok(&s.courses.my_students(&mentor.id)?))
            }

            // Student
            (&Method::GET, ["api", "student", "courses", course_id, "chapters"]) => {
                let student = self.authenticate(&req, Role::Student)?;
                Ok(services::ok(
                    &s.progress.list_chapters_for_student(&student.id, course_id)?,
                ))
            }
            (&Method::POST, ["api", "student", "progress", chapter_id, "complete"]) => {
                let student = self.authenticate(&req, Role::Student)?;
                let result = s.progress.complete_chapter(&student.id, chapter_id)?;
                Ok(services::ok(&CompletionResponse::from(result)))
            }
            (&Method::GET, ["api", "student", "progress", "my"]) => {
                let student = self.authenticate(&req, Role::Student)?;
                Ok(services::ok(&s.completion.my_progress(&student.id)?))
            }
            (&Method::GET, ["api", "certificates", course_id]) => {
                let student = self.authenticate(&req, Role::Student)?;
                let download = s.certificates.download(&student.id, course_id)?;
                Ok(services::attachment_response(
                    download.content_type,
                    &download.filename,
                    download.bytes,
                ))
            }

            _ => Ok(services::route_not_found()),
        }
    }

    /// Verify the bearer token and require a role
    fn authenticate<B>(&self, req: &Request<B>, role: Role) -> Result<Principal, LmsError> {
        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = extract_token_from_header(header_value)
            .ok_or_else(|| LmsError::Unauthorized("No token provided".into()))?;

        let principal = self.services.accounts.jwt().verify_token(token)?;
        principal.require(role)?;
        Ok(principal)
    }
}

fn ok_message(message: &str) -> HttpResponse {
    services::message(StatusCode::OK, message)
}

fn created_message(message: &str) -> HttpResponse {
    services::message(StatusCode::CREATED, message)
}

/// Read and parse a JSON request body
async fn read_json<B, T>(req: Request<B>) -> Result<T, LmsError>
where
    B: Body,
    B::Error: Display,
    T: DeserializeOwned,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| LmsError::InvalidInput(format!("Failed to read body: {}", e)))?
        .to_bytes();

    if body.is_empty() {
        return Err(LmsError::InvalidInput("Request body is required".into()));
    }

    Ok(serde_json::from_slice(&body)?)
}
