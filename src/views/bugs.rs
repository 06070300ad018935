//! Bug tracker list: reports, filters, and report mutations.
//!
//! Status, category, and title search are applied by the server. Priority
//! and sort order are applied locally by [`BugTracker::sorted_reports`], so
//! changing them only re-orders the cached page.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    priority_weight, BugCategory, BugPriority, BugReport, BugReportChanges, BugStatus,
    NewBugReport, Page, PageRequest, Session,
};
use crate::services::notices::{Notice, NoticeSink};
use crate::services::store::{BugStore, ReportQuery};
use crate::state::list_controller::{
    replace, FilterChange, FilterDelta, ListController, ListFilter, ListSource,
};
use crate::views::bug_comments::BugComments;

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 120;
pub const DESCRIPTION_MAX_LEN: usize = 5000;

/// Client-side sort order for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportSort {
    #[default]
    Newest,
    Oldest,
    /// Highest priority first.
    Priority,
    /// Open first, unknown statuses last.
    Status,
    Title,
}

/// Bug report filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BugFilter {
    pub status: Option<BugStatus>,
    pub priority: Option<BugPriority>,
    pub category_id: Option<String>,
    pub search: String,
    pub sort: ReportSort,
}

/// Partial [`BugFilter`] update. Outer `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct BugFilterPatch {
    pub status: Option<Option<BugStatus>>,
    pub priority: Option<Option<BugPriority>>,
    pub category_id: Option<Option<String>>,
    pub search: Option<String>,
    pub sort: Option<ReportSort>,
}

impl BugFilterPatch {
    pub fn status(mut self, status: Option<BugStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Option<BugPriority>) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sort(mut self, sort: ReportSort) -> Self {
        self.sort = Some(sort);
        self
    }
}

impl ListFilter for BugFilter {
    type Item = BugReport;
    type Patch = BugFilterPatch;
    type Query = ReportQuery;

    fn merge(&mut self, patch: BugFilterPatch) -> FilterDelta {
        let mut delta = FilterDelta::default();
        if let Some(status) = patch.status {
            delta.server |= replace(&mut self.status, status);
        }
        if let Some(category_id) = patch.category_id {
            delta.server |= replace(&mut self.category_id, category_id);
        }
        if let Some(search) = patch.search {
            delta.server |= replace(&mut self.search, search);
        }
        if let Some(priority) = patch.priority {
            delta.client |= replace(&mut self.priority, priority);
        }
        if let Some(sort) = patch.sort {
            delta.client |= replace(&mut self.sort, sort);
        }
        delta
    }

    fn server_query(&self) -> ReportQuery {
        ReportQuery {
            status: self.status,
            category_id: self.category_id.clone(),
            search: self.search.trim().to_string(),
        }
    }

    fn retains(&self, report: &BugReport) -> bool {
        match self.priority {
            Some(priority) => report.priority == Some(priority),
            None => true,
        }
    }

    fn compare(&self, a: &BugReport, b: &BugReport) -> Ordering {
        let newest_first = b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id));
        match self.sort {
            ReportSort::Newest => newest_first,
            ReportSort::Oldest => a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id)),
            ReportSort::Priority => priority_weight(b.priority)
                .cmp(&priority_weight(a.priority))
                .then(newest_first),
            ReportSort::Status => a.status.weight().cmp(&b.status.weight()).then(newest_first),
            ReportSort::Title => a
                .title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then(newest_first),
        }
    }
}

#[async_trait]
impl<S: BugStore + ?Sized> ListSource<ReportQuery, BugReport> for S {
    async fn fetch_page(
        &self,
        query: &ReportQuery,
        page: PageRequest,
    ) -> Result<Page<BugReport>, AppError> {
        self.list_reports(query, page).await
    }
}

/// Check a new report before it is sent.
pub fn validate_new_report(input: &NewBugReport) -> Result<(), AppError> {
    let title_len = input.title.trim().chars().count();
    if title_len < TITLE_MIN_LEN {
        return Err(AppError::invalid_input_field(
            format!("Title must be at least {} characters", TITLE_MIN_LEN),
            "title",
        ));
    }
    if title_len > TITLE_MAX_LEN {
        return Err(AppError::invalid_input_field(
            format!("Title must be at most {} characters", TITLE_MAX_LEN),
            "title",
        ));
    }
    let description = input.description.trim();
    if description.is_empty() {
        return Err(AppError::invalid_input_field(
            "Description is required",
            "description",
        ));
    }
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(AppError::invalid_input_field(
            format!("Description must be at most {} characters", DESCRIPTION_MAX_LEN),
            "description",
        ));
    }
    Ok(())
}

/// Bug tracker screen state.
pub struct BugTracker {
    list: ListController<BugFilter, dyn BugStore>,
    store: Arc<dyn BugStore>,
    session: Session,
    categories: Vec<BugCategory>,
    detail: Option<BugComments>,
    notices: NoticeSink,
}

impl BugTracker {
    pub fn new(store: Arc<dyn BugStore>, session: Session, page_size: u32) -> Self {
        Self {
            list: ListController::new("bugs", Arc::clone(&store), page_size),
            store,
            session,
            categories: Vec::new(),
            detail: None,
            notices: NoticeSink::discard(),
        }
    }

    /// Route notices (including those of opened comment threads) to `notices`.
    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.list = self.list.with_notices(notices.clone());
        self.notices = notices;
        self
    }

    pub fn list(&self) -> &ListController<BugFilter, dyn BugStore> {
        &self.list
    }

    pub fn filter(&self) -> &BugFilter {
        self.list.filter()
    }

    /// Reports in server order.
    pub fn reports(&self) -> &[BugReport] {
        self.list.items()
    }

    /// Reports after the client-side priority filter and sort.
    pub fn sorted_reports(&self) -> Vec<&BugReport> {
        self.list.visible_items()
    }

    pub fn categories(&self) -> &[BugCategory] {
        &self.categories
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.list.last_notice()
    }

    pub async fn load_items(&mut self) -> bool {
        self.list.load_items().await
    }

    pub fn update_filter(&mut self, patch: BugFilterPatch) -> FilterChange {
        self.list.update_filter(patch)
    }

    pub async fn apply_filter(&mut self, patch: BugFilterPatch) -> FilterChange {
        self.list.apply_filter(patch).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> bool {
        self.list.go_to_page(page).await
    }

    /// Fetch the category options. Failure keeps the previous list.
    pub async fn load_categories(&mut self) -> bool {
        match self.store.list_categories().await {
            Ok(categories) => {
                self.categories = categories;
                true
            }
            Err(e) => {
                log::warn!("[bugs] failed to load categories: {}", e);
                self.list.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    /// Submit a new report and reload the list.
    pub async fn create_report(&mut self, input: NewBugReport) -> Option<BugReport> {
        if let Err(e) = validate_new_report(&input) {
            self.list.notify(Notice::error(e.user_message()));
            return None;
        }

        let input = NewBugReport {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            ..input
        };

        match self.store.create_report(&input).await {
            Ok(report) => {
                log::info!("[bugs] created report {}", report.id);
                self.list.notify(Notice::success("Report submitted"));
                self.list.load_items().await;
                Some(report)
            }
            Err(e) => {
                log::warn!("[bugs] failed to create report: {}", e);
                self.list.notify(Notice::error(e.user_message()));
                None
            }
        }
    }

    /// Change a report's status. Moderators and admins only.
    pub async fn update_status(&mut self, id: &str, status: BugStatus) -> bool {
        if let Err(e) = self.session.require_moderator("Changing report status") {
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }

        let Some(current) = self.list.find(id).cloned() else {
            self.list
                .notify(Notice::error(AppError::not_found_with_id("Report", id).user_message()));
            return false;
        };
        if current.status == status {
            return true;
        }

        let changes = BugReportChanges {
            status: Some(status),
            ..Default::default()
        };

        match self.store.update_report(id, &changes).await {
            Ok(updated) => {
                let updated = updated.unwrap_or(BugReport { status, ..current });
                self.list.upsert_item(updated);
                self.list.notify(Notice::success("Status updated"));
                true
            }
            Err(e) => {
                log::warn!("[bugs] failed to update status of {}: {}", id, e);
                self.list.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    /// Delete a report. Allowed for its reporter and for moderators.
    /// On failure the report stays listed and `false` is returned.
    pub async fn delete_report(&mut self, id: &str) -> bool {
        let Some(report) = self.list.find(id) else {
            return false;
        };
        if report.reporter_id != self.session.user_id && !self.session.can_moderate() {
            let e = AppError::forbidden("Only the reporter or a moderator can delete a report");
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }

        match self.store.delete_report(id).await {
            Ok(()) => {
                self.list.remove_item(id);
                if self.detail.as_ref().map(|d| d.report_id()) == Some(id) {
                    self.detail = None;
                }
                log::info!("[bugs] deleted report {}", id);
                self.list.notify(Notice::success("Report deleted"));
                true
            }
            Err(e) => {
                log::warn!("[bugs] failed to delete report {}: {}", id, e);
                self.list.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    /// Select a report and attach a comment thread for it.
    /// Comments are fetched by [`BugComments::load_comments`].
    pub fn open_detail(&mut self, id: &str) -> Option<&BugReport> {
        self.list.open_detail(id)?;
        let reopening = self.detail.as_ref().map(|d| d.report_id()) == Some(id);
        if !reopening {
            self.detail = Some(
                BugComments::new(Arc::clone(&self.store), self.session.clone(), id)
                    .with_notices(self.notices.clone()),
            );
        }
        self.list.selected()
    }

    pub fn close_detail(&mut self) {
        self.list.close_detail();
        self.detail = None;
    }

    pub fn selected_report(&self) -> Option<&BugReport> {
        self.list.selected()
    }

    pub fn comments(&self) -> Option<&BugComments> {
        self.detail.as_ref()
    }

    pub fn comments_mut(&mut self) -> Option<&mut BugComments> {
        self.detail.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn report(id: &str, priority: Option<BugPriority>, status: BugStatus, day: u32) -> BugReport {
        let at = Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap();
        BugReport {
            id: id.to_string(),
            title: format!("Report {}", id),
            description: "desc".to_string(),
            status,
            priority,
            category_id: None,
            reporter_id: "u1".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(filter: &BugFilter, reports: &[BugReport]) -> Vec<String> {
        let mut kept: Vec<&BugReport> = reports.iter().filter(|r| filter.retains(r)).collect();
        kept.sort_by(|a, b| filter.compare(a, b));
        kept.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_priority_sort_descending_with_unset_last() {
        let reports = vec![
            report("low", Some(BugPriority::Low), BugStatus::Open, 1),
            report("none", None, BugStatus::Open, 2),
            report("crit", Some(BugPriority::Critical), BugStatus::Open, 3),
            report("high", Some(BugPriority::High), BugStatus::Open, 4),
        ];
        let filter = BugFilter {
            sort: ReportSort::Priority,
            ..Default::default()
        };
        assert_eq!(ids(&filter, &reports), vec!["crit", "high", "low", "none"]);
    }

    #[test]
    fn test_status_sort_ascending_with_ties_newest_first() {
        let reports = vec![
            report("closed", None, BugStatus::Closed, 1),
            report("weird", None, BugStatus::Unknown, 2),
            report("open-old", None, BugStatus::Open, 3),
            report("resolved", None, BugStatus::Resolved, 4),
            report("open-new", None, BugStatus::Open, 5),
        ];
        let filter = BugFilter {
            sort: ReportSort::Status,
            ..Default::default()
        };
        assert_eq!(
            ids(&filter, &reports),
            vec!["open-new", "open-old", "resolved", "closed", "weird"]
        );
    }

    #[test]
    fn test_priority_and_sort_are_client_side() {
        let mut filter = BugFilter::default();
        let delta = filter.merge(
            BugFilterPatch::default()
                .priority(Some(BugPriority::High))
                .sort(ReportSort::Oldest),
        );
        assert!(delta.client);
        assert!(!delta.server);

        let delta = filter.merge(BugFilterPatch::default().search("crash"));
        assert!(delta.server);
        assert_eq!(filter.server_query().search, "crash");
    }

    #[test]
    fn test_validate_new_report() {
        let ok = NewBugReport {
            title: "Chat freezes".to_string(),
            description: "After 10 minutes".to_string(),
            ..Default::default()
        };
        assert!(validate_new_report(&ok).is_ok());

        let short = NewBugReport {
            title: " ab ".to_string(),
            ..ok.clone()
        };
        assert!(validate_new_report(&short).is_err());

        let empty = NewBugReport {
            description: "   ".to_string(),
            ..ok.clone()
        };
        let err = validate_new_report(&empty).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: Some(ref f), .. } if f == "description"));

        let long = NewBugReport {
            title: "x".repeat(TITLE_MAX_LEN + 1),
            ..ok
        };
        assert!(validate_new_report(&long).is_err());
    }
}
