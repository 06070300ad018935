//! Membership applications awaiting admin approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// Review state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

/// A request to join the community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,

    pub applicant_id: String,

    pub username: String,

    pub email: String,

    /// Free text the applicant wrote.
    #[serde(default)]
    pub motivation: String,

    pub status: ApplicationStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub reviewed_by: Option<String>,

    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl Identified for Application {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Body of `PATCH /api/applications/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDecision {
    pub status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}
