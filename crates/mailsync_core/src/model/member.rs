//! Campaign recipient record.
//!
//! # Responsibility
//! - Define the recipient row attached to a campaign.
//!
//! # Invariants
//! - `campaign_id` must reference an existing campaign at all times.
//! - Members declare no primary key of their own; the source schema allows
//!   the same address on several campaigns.

use crate::model::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};

/// Recipient subscribed to one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    /// Recipient email address.
    pub email_id: String,
    pub full_name: String,
    pub campaign_id: String,
}

impl Member {
    pub fn new(
        email_id: impl Into<String>,
        full_name: impl Into<String>,
        campaign_id: impl Into<String>,
    ) -> Self {
        Self {
            email_id: email_id.into(),
            full_name: full_name.into(),
            campaign_id: campaign_id.into(),
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Members", "EmailId", &self.email_id)?;
        require_non_empty("Members", "FullName", &self.full_name)?;
        Ok(())
    }
}
