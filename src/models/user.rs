//! Community member profiles and their group memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// Role attached to a profile, used to gate admin operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Moderator,
    #[default]
    Member,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Member => "member",
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            "moderator" => Self::Moderator,
            _ => Self::Member,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user profile row, with memberships embedded by the select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,

    pub username: String,

    pub email: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    #[serde(default)]
    pub is_banned: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl Identified for UserProfile {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Membership state within a community group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Pending,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Suspended => "suspended",
            Self::Unknown => "unknown",
        }
    }
}

/// A user's membership in one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,

    pub user_id: String,

    /// Display name of the group.
    pub group_name: String,

    pub status: MembershipStatus,

    /// Free-form rank title, e.g. "Veteran".
    #[serde(default)]
    pub rank: Option<String>,

    /// Admin-only notes.
    #[serde(default)]
    pub notes: Option<String>,

    pub joined_at: DateTime<Utc>,
}

impl Identified for Membership {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Editable user fields. `None` means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_banned: Option<bool>,
}

/// Editable membership fields. `None` means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MembershipChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MembershipStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
