//! User identity record.
//!
//! # Responsibility
//! - Define the account row referenced by sessions and campaigns.
//!
//! # Invariants
//! - `id` is the primary key every dependent table points at; renaming it is
//!   only legal through the store's cascading rename operation.

use crate::model::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};

/// Numeric primary key for users.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type UserId = i64;

/// Account registered through the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    /// Stable numeric id. Generated by the store, or provided by import
    /// paths where identity already exists externally.
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Epoch milliseconds of the last completed sync, if any.
    pub last_synced: Option<i64>,
}

impl User {
    /// Creates a user record with a known id.
    pub fn with_id(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            last_synced: None,
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Users", "Username", &self.username)?;
        require_non_empty("Users", "Email", &self.email)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::User;

    #[test]
    fn validate_rejects_empty_username_and_email() {
        assert!(User::with_id(1, "", "a@x.com").validate().is_err());
        assert!(User::with_id(1, "alice", "").validate().is_err());
        assert!(User::with_id(1, "alice", "a@x.com").validate().is_ok());
    }

    #[test]
    fn serde_field_names_match_schema_columns() {
        let user = User::with_id(7, "alice", "a@x.com");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["Id"], 7);
        assert_eq!(json["Username"], "alice");
        assert_eq!(json["Email"], "a@x.com");
        assert!(json["LastSynced"].is_null());
    }
}
