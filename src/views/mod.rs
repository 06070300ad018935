//! Per-screen controllers built on [`crate::state`].
//!
//! Each controller owns its list state and edit overlays and talks to the
//! backend only through the store traits in [`crate::services::store`].

pub mod approvals;
pub mod bug_comments;
pub mod bugs;
pub mod logs;
pub mod users;

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::models::Session;
use crate::services::notices::NoticeSink;
use crate::services::store::{ApplicationStore, BugStore, LogStore, UserStore};

pub use approvals::{ApprovalFilter, ApprovalFilterPatch, ApprovalsTab};
pub use bug_comments::BugComments;
pub use bugs::{BugFilter, BugFilterPatch, BugTracker, ReportSort};
pub use logs::{LogFilter, LogFilterPatch, LogsTab};
pub use users::{MembershipEdit, UserEdit, UserFilter, UserFilterPatch, UserSort, UsersTab};

/// Every screen for one signed-in session, sharing a backend and a notice sink.
pub struct Screens {
    pub bugs: BugTracker,
    pub users: UsersTab,
    pub logs: LogsTab,
    pub approvals: ApprovalsTab,
}

impl Screens {
    /// Build all screens over `backend`, paged by `config.page_size`.
    /// Nothing is fetched until a screen's `load_items` is called.
    pub fn new<B>(backend: Arc<B>, session: Session, config: &ClientConfig) -> Self
    where
        B: BugStore + UserStore + LogStore + ApplicationStore + 'static,
    {
        let page_size = config.page_size;
        let bugs: Arc<dyn BugStore> = backend.clone();
        let users: Arc<dyn UserStore> = backend.clone();
        let logs: Arc<dyn LogStore> = backend.clone();
        let approvals: Arc<dyn ApplicationStore> = backend;

        Self {
            bugs: BugTracker::new(bugs, session.clone(), page_size),
            users: UsersTab::new(users, session.clone(), page_size),
            logs: LogsTab::new(logs, session.clone(), page_size),
            approvals: ApprovalsTab::new(approvals, session, page_size),
        }
    }

    pub fn with_notices(self, notices: NoticeSink) -> Self {
        Self {
            bugs: self.bugs.with_notices(notices.clone()),
            users: self.users.with_notices(notices.clone()),
            logs: self.logs.with_notices(notices.clone()),
            approvals: self.approvals.with_notices(notices),
        }
    }
}
