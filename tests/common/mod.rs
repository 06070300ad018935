//! In-memory backend shared by the integration tests.
//!
//! Implements every store trait over plain vectors, records each call, and
//! can be told to fail specific operations (`"delete_report"`) or specific
//! ids (`"update_user:u2"`).

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use chillers_lib::error::AppError;
use chillers_lib::models::{
    Application, ApplicationDecision, ApplicationStatus, BugCategory, BugComment, BugPriority,
    BugReport, BugReportChanges, BugStatus, LogEntry, LogLevel, Membership, MembershipChanges,
    MembershipStatus, NewBugComment, NewBugReport, Page, PageRequest, UserChanges, UserProfile,
    UserRole,
};
use chillers_lib::services::store::{
    ApplicationQuery, ApplicationStore, BugStore, LogQuery, LogStore, ReportQuery, UserQuery,
    UserStore,
};

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, 9, 0, 0).unwrap()
}

pub fn report(id: &str, priority: Option<BugPriority>, status: BugStatus, day: u32) -> BugReport {
    BugReport {
        id: id.to_string(),
        title: format!("Report {}", id),
        description: "Steps to reproduce".to_string(),
        status,
        priority,
        category_id: None,
        reporter_id: "reporter".to_string(),
        created_at: at(day),
        updated_at: at(day),
    }
}

pub fn membership(id: &str, user_id: &str, status: MembershipStatus) -> Membership {
    Membership {
        id: id.to_string(),
        user_id: user_id.to_string(),
        group_name: "Night Shift".to_string(),
        status,
        rank: None,
        notes: None,
        joined_at: at(1),
    }
}

pub fn user(id: &str, username: &str, day: u32, memberships: Vec<Membership>) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        display_name: Some(username.to_string()),
        role: UserRole::Member,
        is_banned: false,
        created_at: at(day),
        memberships,
    }
}

pub fn log_entry(id: &str, level: LogLevel, action: &str, day: u32) -> LogEntry {
    LogEntry {
        id: id.to_string(),
        level,
        action: action.to_string(),
        actor_id: Some("admin".to_string()),
        message: format!("{} happened", action),
        metadata: serde_json::json!({ "source": "test" }),
        created_at: at(day),
    }
}

pub fn application(id: &str, username: &str, day: u32) -> Application {
    Application {
        id: id.to_string(),
        applicant_id: format!("applicant-{}", id),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        motivation: "I like cold drinks".to_string(),
        status: ApplicationStatus::Pending,
        created_at: at(day),
        reviewed_by: None,
        rejection_reason: None,
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.page_size as usize)
        .collect();
    Page::new(data, Some(total))
}

fn contains(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Default)]
pub struct FakeBackend {
    pub current_user: String,
    pub reports: Mutex<Vec<BugReport>>,
    pub categories: Mutex<Vec<BugCategory>>,
    pub comments: Mutex<Vec<BugComment>>,
    pub users: Mutex<Vec<UserProfile>>,
    pub logs: Mutex<Vec<LogEntry>>,
    pub applications: Mutex<Vec<Application>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
}

impl FakeBackend {
    pub fn new(current_user: &str) -> Self {
        Self {
            current_user: current_user.to_string(),
            ..Default::default()
        }
    }

    /// Make an operation fail, either every call (`"delete_report"`) or for
    /// one id (`"update_user:u2"`).
    pub fn fail(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string());
    }

    pub fn recover(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls to `op`, with or without an id suffix.
    pub fn calls_to(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == op || c.starts_with(&prefix))
            .count()
    }

    fn record(&self, op: &str, id: Option<&str>) -> Result<(), AppError> {
        let key = match id {
            Some(id) => format!("{}:{}", op, id),
            None => op.to_string(),
        };
        self.calls.lock().unwrap().push(key.clone());

        let failures = self.failures.lock().unwrap();
        if failures.contains(op) || failures.contains(&key) {
            return Err(AppError::api_full(
                format!("{} rejected", key),
                500,
                format!("/fake/{}", op),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BugStore for FakeBackend {
    async fn list_reports(
        &self,
        query: &ReportQuery,
        page: PageRequest,
    ) -> Result<Page<BugReport>, AppError> {
        self.record("list_reports", None)?;
        let mut rows: Vec<BugReport> = self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                query
                    .category_id
                    .as_deref()
                    .map_or(true, |c| r.category_id.as_deref() == Some(c))
            })
            .filter(|r| contains(&r.title, &query.search))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn list_categories(&self) -> Result<Vec<BugCategory>, AppError> {
        self.record("list_categories", None)?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create_report(&self, input: &NewBugReport) -> Result<BugReport, AppError> {
        self.record("create_report", None)?;
        let mut reports = self.reports.lock().unwrap();
        let created = BugReport {
            id: format!("r{}", reports.len() + 1),
            title: input.title.clone(),
            description: input.description.clone(),
            status: BugStatus::Open,
            priority: input.priority,
            category_id: input.category_id.clone(),
            reporter_id: self.current_user.clone(),
            created_at: at(28),
            updated_at: at(28),
        };
        reports.push(created.clone());
        Ok(created)
    }

    async fn update_report(
        &self,
        id: &str,
        changes: &BugReportChanges,
    ) -> Result<Option<BugReport>, AppError> {
        self.record("update_report", Some(id))?;
        let mut reports = self.reports.lock().unwrap();
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found_with_id("Report", id))?;
        if let Some(status) = changes.status {
            report.status = status;
        }
        if let Some(priority) = changes.priority {
            report.priority = Some(priority);
        }
        if let Some(category) = &changes.category_id {
            report.category_id = Some(category.clone());
        }
        Ok(Some(report.clone()))
    }

    async fn delete_report(&self, id: &str) -> Result<(), AppError> {
        self.record("delete_report", Some(id))?;
        self.reports.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn list_comments(&self, report_id: &str) -> Result<Vec<BugComment>, AppError> {
        self.record("list_comments", Some(report_id))?;
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn add_comment(&self, input: &NewBugComment) -> Result<BugComment, AppError> {
        self.record("add_comment", Some(&input.report_id))?;
        let mut comments = self.comments.lock().unwrap();
        let comment = BugComment {
            id: format!("c{}", comments.len() + 1),
            report_id: input.report_id.clone(),
            author_id: self.current_user.clone(),
            author_name: None,
            body: input.body.clone(),
            created_at: at(28),
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, id: &str) -> Result<(), AppError> {
        self.record("delete_comment", Some(id))?;
        self.comments.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for FakeBackend {
    async fn list_users(
        &self,
        query: &UserQuery,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, AppError> {
        self.record("list_users", None)?;
        let mut rows: Vec<UserProfile> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .filter(|u| contains(&u.username, &query.search) || contains(&u.email, &query.search))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn update_user(&self, id: &str, changes: &UserChanges) -> Result<(), AppError> {
        self.record("update_user", Some(id))?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::not_found_with_id("User", id))?;
        if let Some(name) = &changes.display_name {
            user.display_name = (!name.is_empty()).then(|| name.clone());
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(banned) = changes.is_banned {
            user.is_banned = banned;
        }
        Ok(())
    }

    async fn update_membership(
        &self,
        id: &str,
        changes: &MembershipChanges,
    ) -> Result<(), AppError> {
        self.record("update_membership", Some(id))?;
        let mut users = self.users.lock().unwrap();
        let membership = users
            .iter_mut()
            .flat_map(|u| u.memberships.iter_mut())
            .find(|m| m.id == id)
            .ok_or_else(|| AppError::not_found_with_id("Membership", id))?;
        if let Some(status) = changes.status {
            membership.status = status;
        }
        if let Some(rank) = &changes.rank {
            membership.rank = (!rank.is_empty()).then(|| rank.clone());
        }
        if let Some(notes) = &changes.notes {
            membership.notes = (!notes.is_empty()).then(|| notes.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for FakeBackend {
    async fn list_logs(
        &self,
        query: &LogQuery,
        page: PageRequest,
    ) -> Result<Page<LogEntry>, AppError> {
        self.record("list_logs", None)?;
        let mut rows: Vec<LogEntry> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| query.level.map_or(true, |l| e.level == l))
            .filter(|e| query.action.as_deref().map_or(true, |a| e.action == a))
            .filter(|e| {
                query
                    .actor_id
                    .as_deref()
                    .map_or(true, |a| e.actor_id.as_deref() == Some(a))
            })
            .filter(|e| contains(&e.message, &query.search))
            .filter(|e| query.since.map_or(true, |s| e.created_at >= s))
            .filter(|e| query.until.map_or(true, |u| e.created_at <= u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl ApplicationStore for FakeBackend {
    async fn list_applications(
        &self,
        query: &ApplicationQuery,
        page: PageRequest,
    ) -> Result<Page<Application>, AppError> {
        self.record("list_applications", None)?;
        let mut rows: Vec<Application> = self
            .applications
            .lock()
            .unwrap()
            .iter()
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| contains(&a.username, &query.search) || contains(&a.email, &query.search))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(rows, page))
    }

    async fn decide_application(
        &self,
        id: &str,
        decision: &ApplicationDecision,
    ) -> Result<(), AppError> {
        self.record("decide_application", Some(id))?;
        let mut applications = self.applications.lock().unwrap();
        let application = applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::not_found_with_id("Application", id))?;
        application.status = decision.status;
        application.rejection_reason = decision.rejection_reason.clone();
        Ok(())
    }
}
