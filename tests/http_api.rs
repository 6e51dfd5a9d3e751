//! HTTP-level tests driving `HttpServer::handle` with in-memory requests

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request, StatusCode};
use serde_json::{json, Value};

use internship_lms::auth::JwtValidator;
use internship_lms::{HttpServer, LmsDb, Services};

const BOOTSTRAP: &str = "bootstrap-secret";

fn server() -> HttpServer {
    let db = Arc::new(LmsDb::open_in_memory().unwrap());
    let services = Arc::new(Services::new(db, JwtValidator::new_dev(), Some(BOOTSTRAP.into())));
    HttpServer::new(services, "127.0.0.1:0".parse().unwrap())
}

struct Reply {
    status: StatusCode,
    headers: hyper::HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn message(&self) -> String {
        self.json()["message"].as_str().unwrap_or_default().to_string()
    }
}

async fn send(
    server: &HttpServer,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let payload = body.map(|b| b.to_string()).unwrap_or_default();
    let request = builder.body(Full::new(Bytes::from(payload))).unwrap();

    let response = server.handle(request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    Reply {
        status,
        headers,
        body,
    }
}

async fn login(server: &HttpServer, email: &str, password: &str) -> String {
    let reply = send(
        server,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "login {}: {:?}", email, reply.body);
    reply.json()["token"].as_str().unwrap().to_string()
}

async fn bootstrap_admin(server: &HttpServer) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/bootstrap-admin")
        .header("x-bootstrap-token", BOOTSTRAP)
        .body(Full::new(Bytes::from(
            json!({ "name": "Root", "email": "root@example.com", "password": "root-pass" })
                .to_string(),
        )))
        .unwrap();
    let response = server.handle(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    login(server, "root@example.com", "root-pass").await
}

fn user_id(users: &Value, email: &str) -> String {
    users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == email)
        .and_then(|u| u["id"].as_str())
        .unwrap()
        .to_string()
}

/// Tokens and ids for a course with `chapters` chapters, assigned to a student
struct Classroom {
    mentor_token: String,
    student_token: String,
    course_id: String,
    chapter_ids: Vec<String>,
}

async fn classroom(server: &HttpServer, chapters: i64) -> Classroom {
    let admin = bootstrap_admin(server).await;

    let reply = send(
        server,
        Method::POST,
        "/api/auth/register-mentor",
        None,
        Some(json!({ "name": "Grace", "email": "grace@example.com", "password": "mentor-pass" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = send(
        server,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "student-pass" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let users = send(server, Method::GET, "/api/admin/users", Some(&admin), None).await;
    let users = users.json();
    assert!(users[0].get("passwordHash").is_none());
    let mentor_id = user_id(&users, "grace@example.com");
    let student_id = user_id(&users, "ada@example.com");

    let reply = send(
        server,
        Method::PUT,
        &format!("/api/admin/users/{}/approve-mentor", mentor_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(
        server,
        Method::POST,
        &format!("/api/admin/mentors/{}/allocate-student", mentor_id),
        Some(&admin),
        Some(json!({ "studentId": student_id })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let mentor_token = login(server, "grace@example.com", "mentor-pass").await;

    let course = send(
        server,
        Method::POST,
        "/api/mentor/courses",
        Some(&mentor_token),
        Some(json!({ "title": "Networking", "description": "Sockets and protocols" })),
    )
    .await;
    assert_eq!(course.status, StatusCode::CREATED);
    let course_id = course.json()["id"].as_str().unwrap().to_string();

    let mut chapter_ids = Vec::new();
    for seq in 1..=chapters {
        let chapter = send(
            server,
            Method::POST,
            &format!("/api/mentor/courses/{}/chapters", course_id),
            Some(&mentor_token),
            Some(json!({ "title": format!("Part {}", seq), "sequence": seq * 10 })),
        )
        .await;
        assert_eq!(chapter.status, StatusCode::CREATED);
        chapter_ids.push(chapter.json()["id"].as_str().unwrap().to_string());
    }

    let reply = send(
        server,
        Method::POST,
        &format!("/api/mentor/courses/{}/assign", course_id),
        Some(&mentor_token),
        Some(json!({ "studentId": student_id })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let student_token = login(server, "ada@example.com", "student-pass").await;

    Classroom {
        mentor_token,
        student_token,
        course_id,
        chapter_ids,
    }
}

async fn complete(server: &HttpServer, c: &Classroom, index: usize) -> Reply {
    send(
        server,
        Method::POST,
        &format!("/api/student/progress/{}/complete", c.chapter_ids[index]),
        Some(&c.student_token),
        None,
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let server = server();
    let reply = send(&server, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["ok"], true);
}

#[tokio::test]
async fn test_unknown_route() {
    let server = server();
    let reply = send(&server, Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = server();
    let reply = send(&server, Method::GET, "/api/student/progress/my", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(!reply.message().is_empty());
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let server = server();
    let c = classroom(&server, 1).await;

    let reply = send(&server, Method::GET, "/api/admin/users", Some(&c.student_token), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &server,
        Method::POST,
        &format!("/api/student/progress/{}/complete", c.chapter_ids[0]),
        Some(&c.mentor_token),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unapproved_mentor_login() {
    let server = server();
    send(
        &server,
        Method::POST,
        "/api/auth/register-mentor",
        None,
        Some(json!({ "name": "New", "email": "new@example.com", "password": "pw" })),
    )
    .await;

    let reply = send(
        &server,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "new@example.com", "password": "pw" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_second_bootstrap_conflicts() {
    let server = server();
    bootstrap_admin(&server).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/bootstrap-admin")
        .header("x-bootstrap-token", BOOTSTRAP)
        .body(Full::new(Bytes::from(
            json!({ "name": "Two", "email": "two@example.com", "password": "pw" }).to_string(),
        )))
        .unwrap();
    let response = server.handle(request).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_student_progress_flow() {
    let server = server();
    let c = classroom(&server, 3).await;

    // Out of order
    let reply = complete(&server, &c, 1).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.message(), "Previous chapter not completed");

    let reply = complete(&server, &c, 0).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "Chapter completed");

    let reply = complete(&server, &c, 0).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "Chapter already completed");

    let chapters = send(
        &server,
        Method::GET,
        &format!("/api/student/courses/{}/chapters", c.course_id),
        Some(&c.student_token),
        None,
    )
    .await
    .json();
    assert_eq!(chapters[0]["completed"], true);
    assert_eq!(chapters[1]["locked"], false);
    assert_eq!(chapters[1]["completed"], false);
    assert_eq!(chapters[2]["locked"], true);
    assert!(chapters[0].get("imageUrl").is_some());

    let mine = send(&server, Method::GET, "/api/student/progress/my", Some(&c.student_token), None)
        .await
        .json();
    assert_eq!(mine[0]["courseId"], c.course_id.as_str());
    assert_eq!(mine[0]["title"], "Networking");
    assert_eq!(mine[0]["completionPercentage"], 33);

    let mentor_view = send(
        &server,
        Method::GET,
        &format!("/api/mentor/courses/{}/progress", c.course_id),
        Some(&c.mentor_token),
        None,
    )
    .await
    .json();
    assert_eq!(mentor_view[0]["email"], "ada@example.com");
    assert_eq!(mentor_view[0]["completionPercentage"], 33);
}

#[tokio::test]
async fn test_certificate_download() {
    let server = server();
    let c = classroom(&server, 2).await;
    let path = format!("/api/certificates/{}", c.course_id);

    complete(&server, &c, 0).await;
    let reply = send(&server, Method::GET, &path, Some(&c.student_token), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "Course not fully completed");

    complete(&server, &c, 1).await;
    let first = send(&server, Method::GET, &path, Some(&c.student_token), None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(
        first.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"certificate-Networking.txt\""
    );

    let text = String::from_utf8(first.body.to_vec()).unwrap();
    assert!(text.contains("Ada"));
    assert!(text.contains("Mentor: Grace"));

    let second = send(&server, Method::GET, &path, Some(&c.student_token), None).await;
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_duplicate_chapter_sequence_conflict() {
    let server = server();
    let c = classroom(&server, 1).await;

    let reply = send(
        &server,
        Method::POST,
        &format!("/api/mentor/courses/{}/chapters", c.course_id),
        Some(&c.mentor_token),
        Some(json!({ "title": "Duplicate", "sequence": 10 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unassigned_student_cannot_read_chapters() {
    let server = server();
    let c = classroom(&server, 1).await;

    send(
        &server,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Mallory", "email": "mallory@example.com", "password": "pw" })),
    )
    .await;
    let outsider = login(&server, "mallory@example.com", "pw").await;

    let reply = send(
        &server,
        Method::GET,
        &format!("/api/student/courses/{}/chapters", c.course_id),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &server,
        Method::POST,
        &format!("/api/student/progress/{}/complete", c.chapter_ids[0]),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = server();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    let response = server.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
