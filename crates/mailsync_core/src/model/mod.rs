//! Domain records persisted by the relational store.
//!
//! # Responsibility
//! - Define canonical record shapes for users, sessions, campaigns, members.
//! - Enforce required-field validation before persistence.
//!
//! # Invariants
//! - Every record is identified by a stable id; ids are never reused.
//! - Serde field names mirror the on-disk column naming (PascalCase).

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod campaign;
pub mod member;
pub mod session;
pub mod user;

/// Required-field violation raised before any SQL runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: &'static str,
    pub field: &'static str,
}

impl ValidationError {
    pub(crate) fn empty(entity: &'static str, field: &'static str) -> Self {
        Self { entity, field }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} must not be empty", self.entity, self.field)
    }
}

impl Error for ValidationError {}

pub(crate) fn require_non_empty(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty(entity, field));
    }
    Ok(())
}
