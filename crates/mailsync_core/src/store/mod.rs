//! Relational store contract and error taxonomy.
//!
//! # Responsibility
//! - Define the transactional CRUD contract external collaborators consume.
//! - Keep SQL details inside the persistence boundary (`sqlite` module).
//!
//! # Invariants
//! - Every mutation either fully applies or has no effect.
//! - After any committed operation, no foreign-key value dangles.
//! - Reads return copies of rows, never live handles, and report absence as
//!   an empty result rather than an error.

use crate::db::DbError;
use crate::model::campaign::Campaign;
use crate::model::member::Member;
use crate::model::session::{SessionId, UserSession};
use crate::model::user::{User, UserId};
use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod graph;
pub mod sqlite;

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for validation, integrity and transport failures.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    /// A write referenced a primary key that does not exist.
    MissingReference { table: &'static str, key: String },
    /// A create or rename collided with an existing primary key.
    DuplicateKey { table: &'static str, key: String },
    /// A write transaction kept losing the database lock and gave up.
    Contention { attempts: u32 },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    Db(DbError),
    InvalidData(String),
}

impl StoreError {
    /// True for both conflict shapes: key collision and lock contention.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. } | Self::Contention { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::MissingReference { table, key } => {
                write!(f, "no row in {table} with primary key `{key}`")
            }
            Self::DuplicateKey { table, key } => {
                write!(f, "{table} already contains primary key `{key}`")
            }
            Self::Contention { attempts } => {
                write!(f, "write transaction abandoned after {attempts} attempts")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; run migrations first"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted row: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Transactional CRUD contract over the four entity tables.
///
/// Mutations that target a specific existing row (`mark_user_synced`,
/// `set_merge_tags`, `update_member_name`, `rename_user_id`) return `false`
/// instead of erroring when the row is absent, mirroring the idempotent
/// delete operations.
pub trait Store {
    /// Inserts a user with a store-generated numeric id.
    fn create_user(&self, username: &str, email: &str) -> StoreResult<User>;
    /// Inserts a user under an externally-assigned id (OAuth metadata path).
    fn create_user_with_id(&self, id: UserId, username: &str, email: &str) -> StoreResult<User>;
    /// Records a completed sync timestamp on the user.
    fn mark_user_synced(&self, id: UserId, synced_at_ms: i64) -> StoreResult<bool>;
    /// Renames a user's primary key, rewriting every referencing row.
    fn rename_user_id(&self, old_id: UserId, new_id: UserId) -> StoreResult<bool>;
    /// Deletes the user plus, transitively, its sessions, campaigns and
    /// those campaigns' members. No-op when the id is unknown.
    fn delete_user(&self, id: UserId) -> StoreResult<()>;
    fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Opens a session for an existing user; the opaque id is generated.
    fn create_session(&self, user_id: UserId, access_token: &str, dc: &str)
        -> StoreResult<UserSession>;
    fn get_session(&self, id: SessionId) -> StoreResult<Option<UserSession>>;
    /// Logout path. No-op when the id is unknown.
    fn delete_session(&self, id: SessionId) -> StoreResult<()>;
    fn list_sessions_by_user(&self, user_id: UserId) -> StoreResult<Vec<UserSession>>;

    /// Creates a campaign with a store-generated id.
    fn create_campaign(
        &self,
        title: &str,
        member_list_id: &str,
        user_id: UserId,
    ) -> StoreResult<Campaign>;
    /// Creates a campaign under an externally-assigned id (import path).
    fn create_campaign_with_id(
        &self,
        id: &str,
        title: &str,
        member_list_id: &str,
        user_id: UserId,
    ) -> StoreResult<Campaign>;
    /// Stores the installed merge-field tags on the campaign.
    fn set_merge_tags(
        &self,
        campaign_id: &str,
        video_tag: &str,
        image_tag: &str,
    ) -> StoreResult<bool>;
    /// Deletes the campaign and all of its members. No-op when absent.
    fn delete_campaign(&self, id: &str) -> StoreResult<()>;
    fn get_campaign(&self, id: &str) -> StoreResult<Option<Campaign>>;
    fn list_campaigns_by_user(&self, user_id: UserId) -> StoreResult<Vec<Campaign>>;

    /// Adds a recipient to an existing campaign.
    fn add_member(&self, email_id: &str, full_name: &str, campaign_id: &str)
        -> StoreResult<Member>;
    /// Rewrites the display name of one recipient (webhook profile update).
    fn update_member_name(
        &self,
        campaign_id: &str,
        email_id: &str,
        full_name: &str,
    ) -> StoreResult<bool>;
    /// Removes every member row matching the address on that campaign.
    fn remove_member(&self, campaign_id: &str, email_id: &str) -> StoreResult<()>;
    fn list_members_by_campaign(&self, campaign_id: &str) -> StoreResult<Vec<Member>>;
}
