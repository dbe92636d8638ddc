//! Authentication session record.
//!
//! # Responsibility
//! - Define the per-login row holding the access token and data-center tag.
//!
//! # Invariants
//! - `user_id` must reference an existing user at all times.
//! - `id` is an opaque token id handed to the caller at login.

use crate::model::user::UserId;
use crate::model::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier stored as text.
pub type SessionId = Uuid;

/// Active login session owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub access_token: String,
    /// Data-center/region tag for the remote API host.
    pub dc: String,
}

impl UserSession {
    /// Creates a session with a freshly generated opaque id.
    pub fn new(user_id: UserId, access_token: impl Into<String>, dc: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, access_token, dc)
    }

    /// Creates a session with a caller-provided id (import/restore paths).
    pub fn with_id(
        id: SessionId,
        user_id: UserId,
        access_token: impl Into<String>,
        dc: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            access_token: access_token.into(),
            dc: dc.into(),
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("UserSessions", "AccessToken", &self.access_token)?;
        require_non_empty("UserSessions", "Dc", &self.dc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::UserSession;

    #[test]
    fn generated_ids_are_unique() {
        let first = UserSession::new(1, "tok", "us6");
        let second = UserSession::new(1, "tok", "us6");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn validate_rejects_blank_token() {
        assert!(UserSession::new(1, " ", "us6").validate().is_err());
        assert!(UserSession::new(1, "tok", "us6").validate().is_ok());
    }
}
