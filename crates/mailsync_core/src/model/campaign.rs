//! Campaign record.
//!
//! # Responsibility
//! - Define the campaign row owned by a user.
//!
//! # Invariants
//! - `user_id` must reference an existing user at all times.
//! - `member_list_id` is an opaque grouping tag, not an enforced reference;
//!   the subsystem it names lives outside this store.

use crate::model::user::UserId;
use crate::model::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Email campaign created by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Campaign {
    /// Stable text id. Generated locally, or provided by import paths where
    /// the id was assigned by the external campaign service.
    pub id: String,
    pub title: String,
    /// Opaque mailing-list tag carried for the external list subsystem.
    pub member_list_id: String,
    pub user_id: UserId,
    /// Merge-field tag for the campaign's video placeholder, once installed.
    pub video_tag: Option<String>,
    /// Merge-field tag for the campaign's image placeholder, once installed.
    pub image_tag: Option<String>,
}

impl Campaign {
    /// Creates a campaign with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        member_list_id: impl Into<String>,
        user_id: UserId,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, member_list_id, user_id)
    }

    /// Creates a campaign with a caller-provided id (import path).
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        member_list_id: impl Into<String>,
        user_id: UserId,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            member_list_id: member_list_id.into(),
            user_id,
            video_tag: None,
            image_tag: None,
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Campaigns", "Id", &self.id)?;
        require_non_empty("Campaigns", "Title", &self.title)?;
        Ok(())
    }
}
