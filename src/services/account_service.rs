//! Account service - registration, login and admin bootstrap

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, JwtValidator};
use crate::db::{users, LmsDb, NewUser, Role, UserRow};
use crate::error::LmsError;

use super::events::{EventBus, LmsEvent};

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login response body
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct AccountService {
    db: Arc<LmsDb>,
    events: Arc<EventBus>,
    jwt: JwtValidator,
    bootstrap_token: Option<String>,
}

impl AccountService {
    pub fn new(
        db: Arc<LmsDb>,
        events: Arc<EventBus>,
        jwt: JwtValidator,
        bootstrap_token: Option<String>,
    ) -> Self {
        Self {
            db,
            events,
            jwt,
            bootstrap_token,
        }
    }

    /// Token verifier shared with the HTTP layer
    pub fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    fn create_account(
        &self,
        request: RegisterRequest,
        role: Role,
        mentor_approved: bool,
    ) -> Result<UserRow, LmsError> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);

        if name.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(LmsError::InvalidInput(
                "Please provide name, email and password.".into(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self.db.with_conn(|conn| {
            users::create_user(
                conn,
                NewUser {
                    name,
                    email,
                    password_hash,
                    role,
                    mentor_approved,
                },
            )
        })?;

        info!(user = %user.id, role = %role, "Account created");
        self.events.emit(LmsEvent::UserRegistered {
            id: user.id.clone(),
            role: role.to_string(),
        });

        Ok(user)
    }

    pub fn register_student(&self, request: RegisterRequest) -> Result<UserRow, LmsError> {
        self.create_account(request, Role::Student, false)
    }

    /// Mentors start unapproved and cannot log in until an admin approves them
    pub fn register_mentor(&self, request: RegisterRequest) -> Result<UserRow, LmsError> {
        self.create_account(request, Role::Mentor, false)
    }

    pub fn login(&self, request: LoginRequest) -> Result<LoginResponse, LmsError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(LmsError::InvalidInput(
                "Please provide email and password.".into(),
            ));
        }

        let invalid = || LmsError::Unauthorized("Invalid email or password.".into());

        let user = self
            .db
            .with_conn(|conn| users::get_user_by_email(conn, &email))?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash)? {
            warn!(user = %user.id, "Failed login");
            return Err(invalid());
        }

        if user.role == Role::Mentor && !user.mentor_approved {
            return Err(LmsError::Forbidden(
                "Your mentor account is awaiting admin approval.".into(),
            ));
        }

        let token = self.jwt.generate_token(&user.id, user.role)?;
        Ok(LoginResponse {
            token,
            role: user.role,
        })
    }

    /// Create the first admin account.
    ///
    /// Requires the configured bootstrap token and works only while no admin
    /// exists.
    pub fn bootstrap_admin(
        &self,
        provided_token: Option<&str>,
        request: RegisterRequest,
    ) -> Result<UserRow, LmsError> {
        match (&self.bootstrap_token, provided_token) {
            (Some(expected), Some(provided)) if !expected.is_empty() && expected == provided => {}
            _ => {
                warn!("Admin bootstrap attempted with missing or wrong token");
                return Err(LmsError::Unauthorized("Unauthorized".into()));
            }
        }

        let admins = self
            .db
            .with_conn(|conn| users::count_users(conn, Some(Role::Admin)))?;
        if admins > 0 {
            return Err(LmsError::Conflict("Admin already exists".into()));
        }

        self.create_account(request, Role::Admin, true)
    }
}
