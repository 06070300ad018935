//! Store traits consumed by the controllers, and their HTTP implementation.
//!
//! Controllers never see a concrete client: they receive an `Arc<dyn ...Store>`
//! so tests (and alternative backends) can inject their own.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::AppError;
use crate::models::{
    Application, ApplicationDecision, ApplicationStatus, BugCategory, BugComment, BugReport,
    BugReportChanges, BugStatus, LogEntry, LogLevel, MembershipChanges, NewBugComment,
    NewBugReport, Page, PageRequest, UserChanges, UserProfile, UserRole,
};
use crate::services::api_client::ApiClient;
use crate::services::query::Query;

/// Server-side half of the bug report filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub status: Option<BugStatus>,
    pub category_id: Option<String>,
    pub search: String,
}

impl ReportQuery {
    pub fn to_query(&self) -> Query {
        Query::new()
            .eq_opt("status", self.status.map(BugStatus::as_str))
            .eq_opt("category_id", self.category_id.as_deref())
            .ilike("title", &self.search)
            .order("created_at", false)
    }
}

/// Server-side half of the users filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub role: Option<UserRole>,
    pub search: String,
}

impl UserQuery {
    pub fn to_query(&self) -> Query {
        Query::new()
            .select("*,memberships(*)")
            .eq_opt("role", self.role.map(UserRole::as_str))
            .search_any(&["username", "email"], &self.search)
            .order("created_at", false)
    }
}

/// Audit log query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
    pub search: String,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new()
            .eq_opt("level", self.level.map(LogLevel::as_str))
            .eq_opt("action", self.action.as_deref())
            .eq_opt("actor_id", self.actor_id.as_deref())
            .ilike("message", &self.search);
        if let Some(since) = self.since {
            query = query.gte("created_at", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        if let Some(until) = self.until {
            query = query.lte("created_at", until.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        query.order("created_at", false)
    }
}

/// Membership application query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub search: String,
}

impl Default for ApplicationQuery {
    fn default() -> Self {
        Self {
            status: Some(ApplicationStatus::Pending),
            search: String::new(),
        }
    }
}

impl ApplicationQuery {
    pub fn to_query(&self) -> Query {
        Query::new()
            .eq_opt("status", self.status.map(ApplicationStatus::as_str))
            .search_any(&["username", "email"], &self.search)
            .order("created_at", true)
    }
}

/// Bug reports, categories, and comments.
#[async_trait]
pub trait BugStore: Send + Sync {
    async fn list_reports(
        &self,
        query: &ReportQuery,
        page: PageRequest,
    ) -> Result<Page<BugReport>, AppError>;

    async fn list_categories(&self) -> Result<Vec<BugCategory>, AppError>;

    async fn create_report(&self, input: &NewBugReport) -> Result<BugReport, AppError>;

    async fn update_report(
        &self,
        id: &str,
        changes: &BugReportChanges,
    ) -> Result<Option<BugReport>, AppError>;

    async fn delete_report(&self, id: &str) -> Result<(), AppError>;

    async fn list_comments(&self, report_id: &str) -> Result<Vec<BugComment>, AppError>;

    async fn add_comment(&self, input: &NewBugComment) -> Result<BugComment, AppError>;

    async fn delete_comment(&self, id: &str) -> Result<(), AppError>;
}

/// User profiles and memberships.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(
        &self,
        query: &UserQuery,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, AppError>;

    async fn update_user(&self, id: &str, changes: &UserChanges) -> Result<(), AppError>;

    async fn update_membership(
        &self,
        id: &str,
        changes: &MembershipChanges,
    ) -> Result<(), AppError>;
}

/// Audit log.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn list_logs(&self, query: &LogQuery, page: PageRequest)
        -> Result<Page<LogEntry>, AppError>;
}

/// Membership applications.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn list_applications(
        &self,
        query: &ApplicationQuery,
        page: PageRequest,
    ) -> Result<Page<Application>, AppError>;

    async fn decide_application(
        &self,
        id: &str,
        decision: &ApplicationDecision,
    ) -> Result<(), AppError>;
}

#[async_trait]
impl BugStore for ApiClient {
    async fn list_reports(
        &self,
        query: &ReportQuery,
        page: PageRequest,
    ) -> Result<Page<BugReport>, AppError> {
        self.select("bug_reports", &query.to_query(), page).await
    }

    async fn list_categories(&self) -> Result<Vec<BugCategory>, AppError> {
        self.select_all("bug_categories", &Query::new().order("name", true))
            .await
    }

    async fn create_report(&self, input: &NewBugReport) -> Result<BugReport, AppError> {
        self.post("/bug-reports", input).await
    }

    async fn update_report(
        &self,
        id: &str,
        changes: &BugReportChanges,
    ) -> Result<Option<BugReport>, AppError> {
        self.patch("/bug-reports", id, changes).await
    }

    async fn delete_report(&self, id: &str) -> Result<(), AppError> {
        self.delete("/bug-reports", id).await
    }

    async fn list_comments(&self, report_id: &str) -> Result<Vec<BugComment>, AppError> {
        let query = Query::new()
            .eq("report_id", report_id)
            .order("created_at", true);
        self.select_all("bug_comments", &query).await
    }

    async fn add_comment(&self, input: &NewBugComment) -> Result<BugComment, AppError> {
        self.post("/bug-comments", input).await
    }

    async fn delete_comment(&self, id: &str) -> Result<(), AppError> {
        self.delete("/bug-comments", id).await
    }
}

#[async_trait]
impl UserStore for ApiClient {
    async fn list_users(
        &self,
        query: &UserQuery,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, AppError> {
        self.select("profiles", &query.to_query(), page).await
    }

    async fn update_user(&self, id: &str, changes: &UserChanges) -> Result<(), AppError> {
        self.patch::<_, serde_json::Value>("/users", id, changes)
            .await
            .map(|_| ())
    }

    async fn update_membership(
        &self,
        id: &str,
        changes: &MembershipChanges,
    ) -> Result<(), AppError> {
        self.patch::<_, serde_json::Value>("/memberships", id, changes)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl LogStore for ApiClient {
    async fn list_logs(
        &self,
        query: &LogQuery,
        page: PageRequest,
    ) -> Result<Page<LogEntry>, AppError> {
        self.select("audit_logs", &query.to_query(), page).await
    }
}

#[async_trait]
impl ApplicationStore for ApiClient {
    async fn list_applications(
        &self,
        query: &ApplicationQuery,
        page: PageRequest,
    ) -> Result<Page<Application>, AppError> {
        self.select("applications", &query.to_query(), page).await
    }

    async fn decide_application(
        &self,
        id: &str,
        decision: &ApplicationDecision,
    ) -> Result<(), AppError> {
        self.patch::<_, serde_json::Value>("/applications", id, decision)
            .await
            .map(|_| ())
    }
}
