//! Authenticated caller identity

use crate::db::Role;
use crate::error::LmsError;

/// Identity extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Reject callers whose role does not match
    pub fn require(&self, role: Role) -> Result<&Self, LmsError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(LmsError::Forbidden("Access denied".into()))
        }
    }
}
