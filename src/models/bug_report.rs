//! Bug report model and the weighting tables used for client-side sorting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// Workflow status of a bug report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    Open,
    Resolved,
    Closed,
    /// Any status the backend knows about that this client does not.
    #[serde(other)]
    Unknown,
}

impl BugStatus {
    /// Ascending sort weight: open first, unknown statuses last.
    pub fn weight(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Resolved => 1,
            Self::Closed => 2,
            Self::Unknown => 9,
        }
    }

    /// Wire value used in data API filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for BugStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "open" => Self::Open,
            "resolved" => Self::Resolved,
            "closed" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for BugStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporter-assigned severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BugPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl BugPriority {
    /// Descending sort weight. An unset priority weighs 0, see [`priority_weight`].
    pub fn weight(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for BugPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight of an optional priority.
pub fn priority_weight(priority: Option<BugPriority>) -> u8 {
    priority.map(BugPriority::weight).unwrap_or(0)
}

/// A bug report as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugReport {
    /// Report ID (uuid).
    pub id: String,

    pub title: String,

    /// Markdown description.
    pub description: String,

    pub status: BugStatus,

    /// Severity, if the reporter set one.
    #[serde(default)]
    pub priority: Option<BugPriority>,

    /// Category ID, if categorised.
    #[serde(default)]
    pub category_id: Option<String>,

    /// User ID of the reporter.
    pub reporter_id: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Identified for BugReport {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating a bug report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewBugReport {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<BugPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// Partial update sent with `PATCH /api/bug-reports/:id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BugReportChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BugStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<BugPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// Category a report can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugCategory {
    pub id: String,
    pub name: String,
}

impl Identified for BugCategory {
    fn id(&self) -> &str {
        &self.id
    }
}
