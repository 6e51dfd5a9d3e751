//! User account operations

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{current_timestamp, is_unique_violation, new_id};
use crate::error::LmsError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Mentor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Mentor => "mentor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "mentor" => Ok(Role::Mentor),
            "admin" => Ok(Role::Admin),
            other => Err(LmsError::Internal(format!("Unknown role in storage: {}", other))),
        }
    }
}

/// User row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub mentor_approved: bool,
    pub created_at: String,
}

impl UserRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let role: String = row.get("role")?;
        let role = role.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let approved: i64 = row.get("mentor_approved")?;

        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            role,
            mentor_approved: approved != 0,
            created_at: row.get("created_at")?,
        })
    }
}

/// Input for creating a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub mentor_approved: bool,
}

/// Create a user. A taken email is reported as `Conflict`.
pub fn create_user(conn: &Connection, input: NewUser) -> Result<UserRow, LmsError> {
    let id = new_id();

    conn.execute(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, mentor_approved, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            input.name,
            input.email,
            input.password_hash,
            input.role.as_str(),
            input.mentor_approved as i64,
            current_timestamp(),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            LmsError::Conflict("That email is already registered.".into())
        } else {
            LmsError::Internal(format!("User insert failed: {}", e))
        }
    })?;

    get_user(conn, &id)?
        .ok_or_else(|| LmsError::Internal("User not found after insert".to_string()))
}

/// Get user by ID
pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, LmsError> {
    conn.query_row("SELECT * FROM users WHERE id = ?", params![id], UserRow::from_row)
        .optional()
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Get user by email (login)
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, LmsError> {
    conn.query_row("SELECT * FROM users WHERE email = ?", params![email], UserRow::from_row)
        .optional()
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))
}

/// Get user by ID only if it holds the given role
pub fn get_user_with_role(
    conn: &Connection,
    id: &str,
    role: Role,
) -> Result<Option<UserRow>, LmsError> {
    Ok(get_user(conn, id)?.filter(|u| u.role == role))
}

/// List all users, oldest first
pub fn list_users(conn: &Connection) -> Result<Vec<UserRow>, LmsError> {
    let mut stmt = conn
        .prepare("SELECT * FROM users ORDER BY created_at, email")
        .map_err(|e| LmsError::Internal(format!("Prepare failed: {}", e)))?;

    let users = stmt
        .query_map([], UserRow::from_row)
        .map_err(|e| LmsError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LmsError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(users)
}

/// Mark a mentor as approved. Returns false if no mentor has that ID.
pub fn approve_mentor(conn: &Connection, id: &str) -> Result<bool, LmsError> {
    let changes = conn
        .execute(
            "UPDATE users SET mentor_approved = 1 WHERE id = ? AND role = 'mentor'",
            params![id],
        )
        .map_err(|e| LmsError::Internal(format!("Update failed: {}", e)))?;

    Ok(changes > 0)
}

/// Delete a user (cascades to owned courses, allocations and progress)
pub fn delete_user(conn: &Connection, id: &str) -> Result<bool, LmsError> {
    let changes = conn
        .execute("DELETE FROM users WHERE id = ?", params![id])
        .map_err(|e| LmsError::Internal(format!("Delete failed: {}", e)))?;

    Ok(changes > 0)
}

/// Count users, optionally restricted to one role
pub fn count_users(conn: &Connection, role: Option<Role>) -> Result<u64, LmsError> {
    let count: i64 = match role {
        Some(role) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?",
            params![role.as_str()],
            |row| row.get(0),
        ),
        None => conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)),
    }
    .map_err(|e| LmsError::Internal(format!("Count query failed: {}", e)))?;

    Ok(count as u64)
}
