//! Admin approvals tab: review pending membership applications.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    Application, ApplicationDecision, ApplicationStatus, Page, PageRequest, Session,
};
use crate::services::notices::{Notice, NoticeSink};
use crate::services::store::{ApplicationQuery, ApplicationStore};
use crate::state::list_controller::{
    replace, FilterChange, FilterDelta, ListController, ListFilter, ListSource,
};

pub const REASON_MIN_LEN: usize = 3;
pub const REASON_MAX_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalFilter {
    /// `None` lists applications in every state.
    pub status: Option<ApplicationStatus>,
    pub search: String,
}

impl Default for ApprovalFilter {
    fn default() -> Self {
        Self {
            status: Some(ApplicationStatus::Pending),
            search: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApprovalFilterPatch {
    pub status: Option<Option<ApplicationStatus>>,
    pub search: Option<String>,
}

impl ApprovalFilterPatch {
    pub fn status(mut self, status: Option<ApplicationStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

impl ListFilter for ApprovalFilter {
    type Item = Application;
    type Patch = ApprovalFilterPatch;
    type Query = ApplicationQuery;

    fn merge(&mut self, patch: ApprovalFilterPatch) -> FilterDelta {
        let mut delta = FilterDelta::default();
        if let Some(status) = patch.status {
            delta.server |= replace(&mut self.status, status);
        }
        if let Some(search) = patch.search {
            delta.server |= replace(&mut self.search, search);
        }
        delta
    }

    fn server_query(&self) -> ApplicationQuery {
        ApplicationQuery {
            status: self.status,
            search: self.search.trim().to_string(),
        }
    }
}

#[async_trait]
impl<S: ApplicationStore + ?Sized> ListSource<ApplicationQuery, Application> for S {
    async fn fetch_page(
        &self,
        query: &ApplicationQuery,
        page: PageRequest,
    ) -> Result<Page<Application>, AppError> {
        self.list_applications(query, page).await
    }
}

/// Check a rejection reason before sending it.
pub fn validate_reason(reason: &str) -> Result<String, AppError> {
    let reason = reason.trim();
    let len = reason.chars().count();
    if len < REASON_MIN_LEN {
        return Err(AppError::invalid_input_field(
            format!("Reason must be at least {} characters", REASON_MIN_LEN),
            "rejection_reason",
        ));
    }
    if len > REASON_MAX_LEN {
        return Err(AppError::invalid_input_field(
            format!("Reason must be at most {} characters", REASON_MAX_LEN),
            "rejection_reason",
        ));
    }
    Ok(reason.to_string())
}

/// Approvals tab state.
pub struct ApprovalsTab {
    list: ListController<ApprovalFilter, dyn ApplicationStore>,
    store: Arc<dyn ApplicationStore>,
    session: Session,
}

impl ApprovalsTab {
    pub fn new(store: Arc<dyn ApplicationStore>, session: Session, page_size: u32) -> Self {
        Self {
            list: ListController::new("approvals", Arc::clone(&store), page_size),
            store,
            session,
        }
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.list = self.list.with_notices(notices);
        self
    }

    pub fn list(&self) -> &ListController<ApprovalFilter, dyn ApplicationStore> {
        &self.list
    }

    pub fn applications(&self) -> &[Application] {
        self.list.items()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.list.last_notice()
    }

    pub async fn load_items(&mut self) -> bool {
        if let Err(e) = self.session.require_admin("Reviewing applications") {
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }
        self.list.load_items().await
    }

    pub async fn apply_filter(&mut self, patch: ApprovalFilterPatch) -> FilterChange {
        let change = self.list.update_filter(patch);
        if change.needs_fetch {
            self.load_items().await;
        }
        change
    }

    pub async fn go_to_page(&mut self, page: u32) -> bool {
        if self.list.set_page(page) {
            self.load_items().await
        } else {
            false
        }
    }

    pub async fn approve(&mut self, id: &str) -> bool {
        let decision = ApplicationDecision {
            status: ApplicationStatus::Approved,
            rejection_reason: None,
        };
        self.decide(id, decision).await
    }

    /// Reject with a reason shown to the applicant.
    pub async fn reject(&mut self, id: &str, reason: &str) -> bool {
        let reason = match validate_reason(reason) {
            Ok(reason) => reason,
            Err(e) => {
                self.list.notify(Notice::error(e.user_message()));
                return false;
            }
        };
        let decision = ApplicationDecision {
            status: ApplicationStatus::Rejected,
            rejection_reason: Some(reason),
        };
        self.decide(id, decision).await
    }

    async fn decide(&mut self, id: &str, decision: ApplicationDecision) -> bool {
        if let Err(e) = self.session.require_admin("Reviewing applications") {
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }
        let Some(current) = self.list.find(id).cloned() else {
            return false;
        };
        if current.status != ApplicationStatus::Pending {
            let e = AppError::invalid_input("This application was already reviewed");
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }

        if let Err(e) = self.store.decide_application(id, &decision).await {
            log::warn!("[approvals] failed to review application {}: {}", id, e);
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }

        log::info!(
            "[approvals] application {} marked {}",
            id,
            decision.status.as_str()
        );

        // Drop the row when it no longer matches the status filter.
        let status_filter = self.list.filter().status;
        if status_filter.map_or(false, |s| s != decision.status) {
            self.list.remove_item(id);
        } else {
            let mut updated = current;
            updated.status = decision.status;
            updated.reviewed_by = Some(self.session.user_id.clone());
            updated.rejection_reason = decision.rejection_reason.clone();
            self.list.upsert_item(updated);
        }

        let message = match decision.status {
            ApplicationStatus::Approved => "Application approved",
            _ => "Application rejected",
        };
        self.list.notify(Notice::success(message));
        true
    }
}
