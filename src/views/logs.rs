//! Admin audit log tab. Read-only; every filter field is applied server-side.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{LogEntry, LogLevel, Page, PageRequest, Session};
use crate::services::notices::{Notice, NoticeSink};
use crate::services::store::{LogQuery, LogStore};
use crate::state::list_controller::{
    replace, FilterChange, FilterDelta, ListController, ListFilter, ListSource,
};
use crate::state::view_state::ExpandedRows;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
    pub search: String,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilterPatch {
    pub level: Option<Option<LogLevel>>,
    pub action: Option<Option<String>>,
    pub actor_id: Option<Option<String>>,
    pub search: Option<String>,
    pub since: Option<Option<DateTime<Utc>>>,
    pub until: Option<Option<DateTime<Utc>>>,
}

impl LogFilterPatch {
    pub fn level(mut self, level: Option<LogLevel>) -> Self {
        self.level = Some(level);
        self
    }

    pub fn action(mut self, action: Option<String>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn actor(mut self, actor_id: Option<String>) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn range(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }
}

/// Blank strings mean "no filter".
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ListFilter for LogFilter {
    type Item = LogEntry;
    type Patch = LogFilterPatch;
    type Query = LogQuery;

    fn merge(&mut self, patch: LogFilterPatch) -> FilterDelta {
        let mut delta = FilterDelta::default();
        if let Some(level) = patch.level {
            delta.server |= replace(&mut self.level, level);
        }
        if let Some(action) = patch.action {
            delta.server |= replace(&mut self.action, non_blank(action));
        }
        if let Some(actor) = patch.actor_id {
            delta.server |= replace(&mut self.actor_id, non_blank(actor));
        }
        if let Some(search) = patch.search {
            delta.server |= replace(&mut self.search, search);
        }
        if let Some(since) = patch.since {
            delta.server |= replace(&mut self.since, since);
        }
        if let Some(until) = patch.until {
            delta.server |= replace(&mut self.until, until);
        }
        delta
    }

    fn server_query(&self) -> LogQuery {
        LogQuery {
            level: self.level,
            action: self.action.clone(),
            actor_id: self.actor_id.clone(),
            search: self.search.trim().to_string(),
            since: self.since,
            until: self.until,
        }
    }
}

#[async_trait]
impl<S: LogStore + ?Sized> ListSource<LogQuery, LogEntry> for S {
    async fn fetch_page(
        &self,
        query: &LogQuery,
        page: PageRequest,
    ) -> Result<Page<LogEntry>, AppError> {
        self.list_logs(query, page).await
    }
}

/// Logs tab state.
pub struct LogsTab {
    list: ListController<LogFilter, dyn LogStore>,
    session: Session,
    expanded: ExpandedRows,
}

impl LogsTab {
    pub fn new(store: Arc<dyn LogStore>, session: Session, page_size: u32) -> Self {
        Self {
            list: ListController::new("logs", store, page_size),
            session,
            expanded: ExpandedRows::new(),
        }
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.list = self.list.with_notices(notices);
        self
    }

    pub fn list(&self) -> &ListController<LogFilter, dyn LogStore> {
        &self.list
    }

    pub fn entries(&self) -> &[LogEntry] {
        self.list.items()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.list.last_notice()
    }

    /// Fetch the current page. Admins only; others never hit the network.
    pub async fn load_items(&mut self) -> bool {
        if let Err(e) = self.session.require_admin("Viewing audit logs") {
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }
        if !self.list.load_items().await {
            return false;
        }
        let list = &self.list;
        self.expanded
            .retain_listed(list.items().iter().map(|e| e.id.as_str()));
        true
    }

    pub async fn apply_filter(&mut self, patch: LogFilterPatch) -> FilterChange {
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

    pub async fn next_page(&mut self) -> bool {
        let page = self.list.page().saturating_add(1);
        self.go_to_page(page).await
    }

    pub async fn prev_page(&mut self) -> bool {
        let page = self.list.page().saturating_sub(1);
        self.go_to_page(page).await
    }

    /// Show or hide the metadata of one entry.
    pub fn toggle_row(&mut self, id: &str) -> bool {
        self.expanded.toggle(id)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.is_expanded(id)
    }
}
