//! Comment model for bug report discussions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// Longest comment body accepted by the backend.
pub const MAX_COMMENT_LEN: usize = 2000;

/// A comment on a bug report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugComment {
    /// Comment ID (uuid).
    pub id: String,

    /// Parent report ID.
    pub report_id: String,

    /// Author's user ID.
    pub author_id: String,

    /// Author's display name, joined in by the endpoint when available.
    #[serde(default)]
    pub author_name: Option<String>,

    /// Comment content (Markdown).
    pub body: String,

    pub created_at: DateTime<Utc>,
}

impl Identified for BugComment {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for `POST /api/bug-comments`.
#[derive(Debug, Clone, Serialize)]
pub struct NewBugComment {
    pub report_id: String,
    pub body: String,
}
