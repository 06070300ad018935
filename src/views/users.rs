//! Admin users tab: user list with inline editing of profile and membership
//! fields.
//!
//! Two overlay maps are kept: one keyed by user id for profile fields and one
//! keyed by membership id for membership fields. Only one user's row can be
//! edited at a time; starting an edit on another user discards the previous
//! user's overlays in both maps.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    Membership, MembershipChanges, MembershipStatus, Page, PageRequest, Session, UserChanges,
    UserProfile, UserRole,
};
use crate::services::notices::{Notice, NoticeSink};
use crate::services::store::{UserQuery, UserStore};
use crate::state::list_controller::{
    replace, FilterChange, FilterDelta, ListController, ListFilter, ListSource,
};
use crate::state::reconciler::{BatchReport, EditReconciler, Overlay, SaveOutcome};
use crate::state::view_state::{ActiveEditor, ExpandedRows};

pub const DISPLAY_NAME_MIN_LEN: usize = 2;
pub const DISPLAY_NAME_MAX_LEN: usize = 40;
pub const RANK_MAX_LEN: usize = 30;
pub const NOTES_MAX_LEN: usize = 500;

/// Client-side sort order for users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    #[default]
    Newest,
    Oldest,
    Username,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub search: String,
    pub sort: UserSort,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilterPatch {
    pub role: Option<Option<UserRole>>,
    pub search: Option<String>,
    pub sort: Option<UserSort>,
}

impl UserFilterPatch {
    pub fn role(mut self, role: Option<UserRole>) -> Self {
        self.role = Some(role);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sort(mut self, sort: UserSort) -> Self {
        self.sort = Some(sort);
        self
    }
}

impl ListFilter for UserFilter {
    type Item = UserProfile;
    type Patch = UserFilterPatch;
    type Query = UserQuery;

    fn merge(&mut self, patch: UserFilterPatch) -> FilterDelta {
        let mut delta = FilterDelta::default();
        if let Some(role) = patch.role {
            delta.server |= replace(&mut self.role, role);
        }
        if let Some(search) = patch.search {
            delta.server |= replace(&mut self.search, search);
        }
        if let Some(sort) = patch.sort {
            delta.client |= replace(&mut self.sort, sort);
        }
        delta
    }

    fn server_query(&self) -> UserQuery {
        UserQuery {
            role: self.role,
            search: self.search.trim().to_string(),
        }
    }

    fn compare(&self, a: &UserProfile, b: &UserProfile) -> Ordering {
        match self.sort {
            UserSort::Newest => b.created_at.cmp(&a.created_at),
            UserSort::Oldest => a.created_at.cmp(&b.created_at),
            UserSort::Username => a.username.to_lowercase().cmp(&b.username.to_lowercase()),
        }
        .then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait]
impl<S: UserStore + ?Sized> ListSource<UserQuery, UserProfile> for S {
    async fn fetch_page(
        &self,
        query: &UserQuery,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, AppError> {
        self.list_users(query, page).await
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEdit {
    pub display_name: String,
    pub role: UserRole,
    pub is_banned: bool,
}

impl Overlay for UserEdit {
    type Entity = UserProfile;
    type Patch = UserChanges;

    fn seed(user: &UserProfile) -> Self {
        Self {
            display_name: user.display_name.clone().unwrap_or_default(),
            role: user.role,
            is_banned: user.is_banned,
        }
    }

    fn merge(&mut self, patch: UserChanges) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(banned) = patch.is_banned {
            self.is_banned = banned;
        }
    }

    fn validate(&self, base: &Self) -> Result<(), AppError> {
        if self.display_name.trim() == base.display_name.trim() {
            return Ok(());
        }
        let len = self.display_name.trim().chars().count();
        if len > 0 && len < DISPLAY_NAME_MIN_LEN {
            return Err(AppError::invalid_input_field(
                format!("Display name must be at least {} characters", DISPLAY_NAME_MIN_LEN),
                "display_name",
            ));
        }
        if len > DISPLAY_NAME_MAX_LEN {
            return Err(AppError::invalid_input_field(
                format!("Display name must be at most {} characters", DISPLAY_NAME_MAX_LEN),
                "display_name",
            ));
        }
        Ok(())
    }

    fn diff(&self, base: &Self) -> UserChanges {
        UserChanges {
            display_name: (self.display_name.trim() != base.display_name.trim())
                .then(|| self.display_name.trim().to_string()),
            role: (self.role != base.role).then_some(self.role),
            is_banned: (self.is_banned != base.is_banned).then_some(self.is_banned),
        }
    }

    fn apply(&self, user: &mut UserProfile) {
        let name = self.display_name.trim();
        user.display_name = (!name.is_empty()).then(|| name.to_string());
        user.role = self.role;
        user.is_banned = self.is_banned;
    }
}

/// Editable membership fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipEdit {
    pub status: MembershipStatus,
    pub rank: String,
    pub notes: String,
}

impl Overlay for MembershipEdit {
    type Entity = Membership;
    type Patch = MembershipChanges;

    fn seed(membership: &Membership) -> Self {
        Self {
            status: membership.status,
            rank: membership.rank.clone().unwrap_or_default(),
            notes: membership.notes.clone().unwrap_or_default(),
        }
    }

    fn merge(&mut self, patch: MembershipChanges) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(rank) = patch.rank {
            self.rank = rank;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }

    fn validate(&self, base: &Self) -> Result<(), AppError> {
        if self.status != base.status && self.status == MembershipStatus::Unknown {
            return Err(AppError::invalid_input_field(
                "Choose a membership status",
                "status",
            ));
        }
        let rank = self.rank.trim();
        if rank != base.rank.trim() && rank.chars().count() > RANK_MAX_LEN {
            return Err(AppError::invalid_input_field(
                format!("Rank must be at most {} characters", RANK_MAX_LEN),
                "rank",
            ));
        }
        if self.notes != base.notes && self.notes.chars().count() > NOTES_MAX_LEN {
            return Err(AppError::invalid_input_field(
                format!("Notes must be at most {} characters", NOTES_MAX_LEN),
                "notes",
            ));
        }
        Ok(())
    }

    fn diff(&self, base: &Self) -> MembershipChanges {
        MembershipChanges {
            status: (self.status != base.status).then_some(self.status),
            rank: (self.rank.trim() != base.rank.trim()).then(|| self.rank.trim().to_string()),
            notes: (self.notes != base.notes).then(|| self.notes.clone()),
        }
    }

    fn apply(&self, membership: &mut Membership) {
        let rank = self.rank.trim();
        membership.status = self.status;
        membership.rank = (!rank.is_empty()).then(|| rank.to_string());
        membership.notes = (!self.notes.is_empty()).then(|| self.notes.clone());
    }
}

/// Users tab state.
pub struct UsersTab {
    list: ListController<UserFilter, dyn UserStore>,
    store: Arc<dyn UserStore>,
    session: Session,
    user_edits: EditReconciler<UserEdit>,
    membership_edits: EditReconciler<MembershipEdit>,
    active: ActiveEditor,
    expanded: ExpandedRows,
}

impl UsersTab {
    pub fn new(store: Arc<dyn UserStore>, session: Session, page_size: u32) -> Self {
        Self {
            list: ListController::new("users", Arc::clone(&store), page_size),
            store,
            session,
            user_edits: EditReconciler::new(),
            membership_edits: EditReconciler::new(),
            active: ActiveEditor::new(),
            expanded: ExpandedRows::new(),
        }
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.list = self.list.with_notices(notices);
        self
    }

    pub fn list(&self) -> &ListController<UserFilter, dyn UserStore> {
        &self.list
    }

    /// Users after the client-side sort.
    pub fn users(&self) -> Vec<&UserProfile> {
        self.list.visible_items()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.list.last_notice()
    }

    pub fn active_user(&self) -> Option<&str> {
        self.active.current()
    }

    pub fn user_edits(&self) -> &EditReconciler<UserEdit> {
        &self.user_edits
    }

    pub fn membership_edits(&self) -> &EditReconciler<MembershipEdit> {
        &self.membership_edits
    }

    pub fn has_pending_changes(&self) -> bool {
        self.user_edits.has_pending() || self.membership_edits.has_pending()
    }

    /// Fetch the current page. Admins only.
    pub async fn load_items(&mut self) -> bool {
        if let Err(e) = self.session.require_admin("Viewing users") {
            self.list.notify(Notice::error(e.user_message()));
            return false;
        }
        self.reload().await
    }

    pub async fn apply_filter(&mut self, patch: UserFilterPatch) -> FilterChange {
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

    /// Reload the list and prune overlays the server moved underneath.
    async fn reload(&mut self) -> bool {
        if !self.list.load_items().await {
            return false;
        }

        let users = self.list.items();
        let dropped_users = self.user_edits.reconcile(users);
        let dropped_memberships = self
            .membership_edits
            .reconcile(users.iter().flat_map(|u| u.memberships.iter()));
        if !dropped_users.is_empty() || !dropped_memberships.is_empty() {
            log::info!(
                "[users] discarded {} stale user edits and {} stale membership edits",
                dropped_users.len(),
                dropped_memberships.len()
            );
        }

        self.expanded
            .retain_listed(users.iter().map(|u| u.id.as_str()));
        let orphaned = self
            .active
            .current()
            .map_or(false, |id| self.list.find(id).is_none());
        if orphaned {
            self.active.clear();
        }
        true
    }

    fn find_membership(&self, membership_id: &str) -> Option<(&UserProfile, &Membership)> {
        self.list.items().iter().find_map(|user| {
            user.memberships
                .iter()
                .find(|m| m.id == membership_id)
                .map(|m| (user, m))
        })
    }

    /// Make `user_id` the only user with open edits.
    fn switch_active(&mut self, user_id: &str) {
        if let Some(previous) = self.active.activate(user_id) {
            self.discard_user_edits(&previous);
        }
    }

    fn discard_user_edits(&mut self, user_id: &str) {
        self.user_edits.cancel_edit(user_id);
        let membership_ids: Vec<String> = self
            .list
            .find(user_id)
            .map(|u| u.memberships.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default();
        for id in membership_ids {
            self.membership_edits.cancel_edit(&id);
        }
    }

    /// Release the active slot once a user has no overlays left.
    fn release_if_idle(&mut self, user_id: &str) {
        let has_membership_edits = self
            .list
            .find(user_id)
            .map(|u| u.memberships.iter().any(|m| self.membership_edits.is_editing(&m.id)))
            .unwrap_or(false);
        if !self.user_edits.is_editing(user_id) && !has_membership_edits {
            self.active.release(user_id);
        }
    }

    pub fn begin_user_edit(&mut self, user_id: &str) -> bool {
        let Some(user) = self.list.find(user_id).cloned() else {
            return false;
        };
        self.switch_active(user_id);
        self.user_edits.begin_edit(&user);
        true
    }

    pub fn update_user_edit(&mut self, user_id: &str, patch: UserChanges) -> bool {
        self.user_edits.update_edit(user_id, patch)
    }

    pub fn cancel_user_edit(&mut self, user_id: &str) -> bool {
        let cancelled = self.user_edits.cancel_edit(user_id);
        self.release_if_idle(user_id);
        cancelled
    }

    pub fn begin_membership_edit(&mut self, membership_id: &str) -> bool {
        let Some((user_id, membership)) = self
            .find_membership(membership_id)
            .map(|(u, m)| (u.id.clone(), m.clone()))
        else {
            return false;
        };
        self.switch_active(&user_id);
        self.membership_edits.begin_edit(&membership);
        true
    }

    pub fn update_membership_edit(&mut self, membership_id: &str, patch: MembershipChanges) -> bool {
        self.membership_edits.update_edit(membership_id, patch)
    }

    pub fn cancel_membership_edit(&mut self, membership_id: &str) -> bool {
        let owner = self
            .find_membership(membership_id)
            .map(|(u, _)| u.id.clone());
        let cancelled = self.membership_edits.cancel_edit(membership_id);
        if let Some(owner) = owner {
            self.release_if_idle(&owner);
        }
        cancelled
    }

    /// The user as currently displayed, overlays applied.
    pub fn displayed_user(&self, user_id: &str) -> Option<UserProfile> {
        let user = self.list.find(user_id)?;
        let mut shown = self.user_edits.display(user);
        for membership in shown.memberships.iter_mut() {
            *membership = self.membership_edits.display(membership);
        }
        Some(shown)
    }

    pub fn displayed_membership(&self, membership_id: &str) -> Option<Membership> {
        self.find_membership(membership_id)
            .map(|(_, m)| self.membership_edits.display(m))
    }

    pub fn toggle_row(&mut self, user_id: &str) -> bool {
        self.expanded.toggle(user_id)
    }

    pub fn is_expanded(&self, user_id: &str) -> bool {
        self.expanded.is_expanded(user_id)
    }

    async fn persist_user(&mut self, user_id: &str) -> SaveOutcome {
        if let Err(e) = self.session.require_admin("Editing users") {
            self.user_edits.set_error(user_id, e.clone());
            return SaveOutcome::Failed(e);
        }
        let shown = self
            .list
            .find(user_id)
            .map(|user| self.user_edits.display(user));
        let store = Arc::clone(&self.store);
        let id = user_id.to_string();
        let outcome = self
            .user_edits
            .save(user_id, move |changes| async move {
                store.update_user(&id, &changes).await
            })
            .await;

        // Keep the cached row in step until the next reload.
        if let (SaveOutcome::Saved, Some(user)) = (&outcome, shown) {
            self.list.upsert_item(user);
        }
        outcome
    }

    async fn persist_membership(&mut self, membership_id: &str) -> SaveOutcome {
        if let Err(e) = self.session.require_admin("Editing memberships") {
            self.membership_edits.set_error(membership_id, e.clone());
            return SaveOutcome::Failed(e);
        }
        let shown = self
            .find_membership(membership_id)
            .map(|(user, m)| (user.clone(), self.membership_edits.display(m)));
        let store = Arc::clone(&self.store);
        let id = membership_id.to_string();
        let outcome = self
            .membership_edits
            .save(membership_id, move |changes| async move {
                store.update_membership(&id, &changes).await
            })
            .await;

        if let (SaveOutcome::Saved, Some((mut user, membership))) = (&outcome, shown) {
            if let Some(slot) = user.memberships.iter_mut().find(|m| m.id == membership.id) {
                *slot = membership;
            }
            self.list.upsert_item(user);
        }
        outcome
    }

    /// Save one user's profile overlay.
    pub async fn save_user(&mut self, user_id: &str, should_reload: bool) -> bool {
        let outcome = self.persist_user(user_id).await;
        self.finish_single_save("user", user_id, outcome, should_reload)
            .await
    }

    /// Save one membership overlay.
    pub async fn save_membership(&mut self, membership_id: &str, should_reload: bool) -> bool {
        let owner = self
            .find_membership(membership_id)
            .map(|(u, _)| u.id.clone());
        let outcome = self.persist_membership(membership_id).await;
        let saved = self
            .finish_single_save("membership", membership_id, outcome, should_reload)
            .await;
        if let Some(owner) = owner {
            self.release_if_idle(&owner);
        }
        saved
    }

    async fn finish_single_save(
        &mut self,
        kind: &str,
        id: &str,
        outcome: SaveOutcome,
        should_reload: bool,
    ) -> bool {
        match outcome {
            SaveOutcome::Saved | SaveOutcome::Unchanged => {
                log::info!("[users] saved {} {}", kind, id);
                if kind == "user" {
                    self.release_if_idle(id);
                }
                if should_reload && !self.reload().await {
                    // saved, but the refresh failed; its error notice stays
                    return true;
                }
                self.list.notify(Notice::success("Changes saved"));
                true
            }
            SaveOutcome::Invalid(e) | SaveOutcome::Failed(e) => {
                if !e.is_validation() {
                    log::warn!("[users] failed to save {} {}: {}", kind, id, e);
                }
                self.list.notify(Notice::error(e.user_message()));
                false
            }
            SaveOutcome::NotEditing => false,
        }
    }

    /// Save every pending overlay in both maps, then reload once.
    ///
    /// Each overlay is saved independently; a failure never stops the rest.
    /// Failed overlays stay in place with their per-id error. When the final
    /// reload fails, saved rows are patched locally and the reload error is
    /// left as the last notice.
    pub async fn save_all(&mut self) -> BatchReport {
        let user_ids = self.user_edits.pending_ids();
        let membership_ids = self.membership_edits.pending_ids();
        let mut report = BatchReport::default();

        if user_ids.is_empty() && membership_ids.is_empty() {
            self.list.notify(Notice::info("No changes to save"));
            return report;
        }

        for id in &user_ids {
            let outcome = self.persist_user(id).await;
            report.record(id, outcome);
        }
        for id in &membership_ids {
            let outcome = self.persist_membership(id).await;
            report.record(id, outcome);
        }

        log::info!(
            "[users] batch save: {} saved, {} unchanged, {} failed",
            report.saved.len(),
            report.unchanged.len(),
            report.failed.len()
        );

        let reloaded = self.reload().await;
        if !self.has_pending_changes() {
            self.active.clear();
        }

        if report.has_failures() {
            self.list.notify(Notice::error("Some updates need fixes"));
        } else if reloaded {
            self.list.notify(Notice::success("Changes saved"));
        }
        report
    }
}
