//! Comment thread for one bug report.

use std::sync::Arc;

use crate::error::AppError;
use crate::models::comment::MAX_COMMENT_LEN;
use crate::models::{BugComment, NewBugComment, Session};
use crate::services::notices::{Notice, NoticeSink};
use crate::services::store::BugStore;

/// A comment fetch in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTicket {
    generation: u64,
}

/// Comments of the report currently open in the detail view.
pub struct BugComments {
    report_id: String,
    store: Arc<dyn BugStore>,
    session: Session,
    comments: Vec<BugComment>,
    is_loading: bool,
    generation: u64,
    notices: NoticeSink,
    last_notice: Option<Notice>,
}

impl BugComments {
    pub fn new(store: Arc<dyn BugStore>, session: Session, report_id: impl Into<String>) -> Self {
        Self {
            report_id: report_id.into(),
            store,
            session,
            comments: Vec::new(),
            is_loading: false,
            generation: 0,
            notices: NoticeSink::discard(),
            last_notice: None,
        }
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.notices = notices;
        self
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn comments(&self) -> &[BugComment] {
        &self.comments
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.emit(notice.clone());
        self.last_notice = Some(notice);
    }

    pub fn begin_load(&mut self) -> CommentTicket {
        self.generation += 1;
        self.is_loading = true;
        CommentTicket {
            generation: self.generation,
        }
    }

    /// Apply fetched comments unless a newer fetch was started meanwhile.
    pub fn finish_load(
        &mut self,
        ticket: CommentTicket,
        result: Result<Vec<BugComment>, AppError>,
    ) -> bool {
        if ticket.generation != self.generation {
            log::debug!("[comments] dropping stale comments for {}", self.report_id);
            return false;
        }
        self.is_loading = false;

        match result {
            Ok(comments) => {
                self.comments = comments;
                true
            }
            Err(e) => {
                log::warn!("[comments] failed to load comments for {}: {}", self.report_id, e);
                self.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    pub async fn load_comments(&mut self) -> bool {
        let ticket = self.begin_load();
        let store = Arc::clone(&self.store);
        let result = store.list_comments(&self.report_id).await;
        self.finish_load(ticket, result)
    }

    /// Post a comment. A blank body is ignored and returns `false` without
    /// contacting the server.
    pub async fn add_comment(&mut self, body: &str) -> bool {
        let body = body.trim();
        if body.is_empty() {
            return false;
        }
        if body.chars().count() > MAX_COMMENT_LEN {
            let e = AppError::invalid_input_field(
                format!("Comments are limited to {} characters", MAX_COMMENT_LEN),
                "body",
            );
            self.notify(Notice::error(e.user_message()));
            return false;
        }

        let input = NewBugComment {
            report_id: self.report_id.clone(),
            body: body.to_string(),
        };

        match self.store.add_comment(&input).await {
            Ok(comment) => {
                self.comments.push(comment);
                true
            }
            Err(e) => {
                log::warn!("[comments] failed to add comment to {}: {}", self.report_id, e);
                self.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    /// Delete a comment. Authors may delete their own; admins any.
    pub async fn delete_comment(&mut self, id: &str) -> bool {
        let Some(comment) = self.comments.iter().find(|c| c.id == id) else {
            return false;
        };
        if comment.author_id != self.session.user_id && !self.session.is_admin() {
            let e = AppError::forbidden("Only the author or an admin can delete a comment");
            self.notify(Notice::error(e.user_message()));
            return false;
        }

        match self.store.delete_comment(id).await {
            Ok(()) => {
                self.comments.retain(|c| c.id != id);
                true
            }
            Err(e) => {
                log::warn!("[comments] failed to delete comment {}: {}", id, e);
                self.notify(Notice::error(e.user_message()));
                false
            }
        }
    }
}
