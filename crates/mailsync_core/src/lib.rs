//! Core relational storage for MailSync.
//! This crate is the single source of truth for referential integrity.

pub mod db;
pub mod logging;
pub mod model;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::campaign::Campaign;
pub use model::member::Member;
pub use model::session::{SessionId, UserSession};
pub use model::user::{User, UserId};
pub use model::ValidationError;
pub use store::sqlite::SqliteStore;
pub use store::{Store, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
