//! Paginated, filtered list state backed by a remote source.
//!
//! A [`ListController`] owns the filter, the current page, and the cached
//! page of items. Filters are split in two halves: fields the server applies
//! (changing them needs a fetch) and fields applied locally by
//! [`ListFilter::retains`] / [`ListFilter::compare`] (changing them never does).
//!
//! Fetches are guarded by a generation counter. Every [`LoadTicket`] records
//! the generation it was issued under; results for an older generation are
//! dropped so a slow response can never overwrite newer state.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::page::page_count;
use crate::models::{Identified, Page, PageRequest};
use crate::services::notices::{Notice, NoticeSink};

/// Which halves of a filter a patch touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterDelta {
    /// A server-side field changed.
    pub server: bool,
    /// A client-side field changed.
    pub client: bool,
}

impl FilterDelta {
    pub fn is_empty(&self) -> bool {
        !self.server && !self.client
    }
}

/// Assign `value` to `slot`, reporting whether it differed.
pub fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// A list filter value object.
pub trait ListFilter: Clone + Default {
    type Item: Identified + Clone + Send + Sync;

    /// Partial update merged by [`ListController::update_filter`].
    type Patch;

    /// What the source needs to fetch a page.
    type Query: Clone + Send + Sync;

    /// Shallow-merge a patch, reporting what changed.
    fn merge(&mut self, patch: Self::Patch) -> FilterDelta;

    /// Server-side half of the filter.
    fn server_query(&self) -> Self::Query;

    /// Client-side filtering. Keeps everything by default.
    fn retains(&self, _item: &Self::Item) -> bool {
        true
    }

    /// Client-side ordering. Keeps server order by default.
    fn compare(&self, _a: &Self::Item, _b: &Self::Item) -> Ordering {
        Ordering::Equal
    }
}

/// Anything that can serve one page of a list.
#[async_trait]
pub trait ListSource<Q: Sync, T: Send>: Send + Sync {
    async fn fetch_page(&self, query: &Q, page: PageRequest) -> Result<Page<T>, AppError>;
}

/// Result of [`ListController::update_filter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterChange {
    /// The page went back to 1.
    pub page_reset: bool,
    /// The cached page no longer matches the filter and must be refetched.
    pub needs_fetch: bool,
}

/// A fetch in flight.
#[derive(Debug, Clone)]
pub struct LoadTicket<Q> {
    generation: u64,
    pub query: Q,
    pub page: PageRequest,
}

impl<Q> LoadTicket<Q> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// State of one paginated list view.
pub struct ListController<F: ListFilter, S: ?Sized> {
    label: &'static str,
    source: Arc<S>,
    filter: F,
    items: Vec<F::Item>,
    page: u32,
    page_size: u32,
    total: Option<u64>,
    is_loading: bool,
    stale: bool,
    generation: u64,
    selected: Option<String>,
    notices: NoticeSink,
    last_notice: Option<Notice>,
}

impl<F: ListFilter, S: ?Sized> ListController<F, S> {
    /// Create an empty controller. Nothing is fetched until
    /// [`load_items`](Self::load_items) is called.
    pub fn new(label: &'static str, source: Arc<S>, page_size: u32) -> Self {
        Self {
            label,
            source,
            filter: F::default(),
            items: Vec::new(),
            page: 1,
            page_size: page_size.max(1),
            total: None,
            is_loading: false,
            stale: true,
            generation: 0,
            selected: None,
            notices: NoticeSink::discard(),
            last_notice: None,
        }
    }

    /// Route notices to the given sink.
    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.notices = notices;
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Cached items in server order.
    pub fn items(&self) -> &[F::Item] {
        &self.items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Number of pages; falls back to "this page is the last" without a total.
    pub fn page_count(&self) -> u32 {
        match self.total {
            Some(total) => page_count(total, self.page_size),
            None => self.page,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether the cached page no longer matches filter and page.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    /// Record and emit a notice.
    pub fn notify(&mut self, notice: Notice) {
        self.notices.emit(notice.clone());
        self.last_notice = Some(notice);
    }

    /// Merge a filter patch.
    ///
    /// Any change sends the list back to page 1 before the next fetch. Only
    /// server-side changes, or a page reset, make the cached page stale.
    pub fn update_filter(&mut self, patch: F::Patch) -> FilterChange {
        let delta = self.filter.merge(patch);
        if delta.is_empty() {
            return FilterChange::default();
        }

        let page_reset = replace(&mut self.page, 1);
        let needs_fetch = delta.server || page_reset;
        if needs_fetch {
            self.invalidate();
        }

        log::debug!(
            "[{}] filter changed (server: {}, page reset: {})",
            self.label,
            delta.server,
            page_reset
        );

        FilterChange {
            page_reset,
            needs_fetch,
        }
    }

    /// Move to another page, clamped to the known page count.
    /// Returns whether the page changed.
    pub fn set_page(&mut self, page: u32) -> bool {
        let upper = self.total.map(|_| self.page_count()).unwrap_or(u32::MAX);
        let page = page.clamp(1, upper.max(1));
        let changed = replace(&mut self.page, page);
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Cached items after client-side filtering and sorting.
    pub fn visible_items(&self) -> Vec<&F::Item> {
        let mut visible: Vec<&F::Item> = self
            .items
            .iter()
            .filter(|item| self.filter.retains(item))
            .collect();
        visible.sort_by(|a, b| self.filter.compare(a, b));
        visible
    }

    pub fn find(&self, id: &str) -> Option<&F::Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Select a cached item as the detail target.
    pub fn open_detail(&mut self, id: &str) -> Option<&F::Item> {
        if self.find(id).is_some() {
            self.selected = Some(id.to_string());
            self.find(id)
        } else {
            None
        }
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&F::Item> {
        self.selected.as_deref().and_then(|id| self.find(id))
    }

    /// Replace a cached item with a fresher copy, or insert it at the top.
    pub fn upsert_item(&mut self, item: F::Item) {
        match self.items.iter().position(|i| i.id() == item.id()) {
            Some(index) => self.items[index] = item,
            None => {
                self.items.insert(0, item);
                self.total = self.total.map(|t| t + 1);
            }
        }
    }

    /// Drop an item from the cache (after a confirmed delete).
    pub fn remove_item(&mut self, id: &str) -> Option<F::Item> {
        let index = self.items.iter().position(|i| i.id() == id)?;
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.total = self.total.map(|t| t.saturating_sub(1));
        Some(self.items.remove(index))
    }

    /// Start a fetch for the current filter and page.
    pub fn begin_load(&mut self) -> LoadTicket<F::Query> {
        self.generation += 1;
        self.is_loading = true;
        LoadTicket {
            generation: self.generation,
            query: self.filter.server_query(),
            page: PageRequest::new(self.page, self.page_size),
        }
    }

    /// Apply a fetch result. Returns `false` if the ticket was superseded or
    /// the fetch failed; a failed fetch leaves the cached items untouched.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket<F::Query>,
        result: Result<Page<F::Item>, AppError>,
    ) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "[{}] dropping stale result (generation {} < {})",
                self.label,
                ticket.generation,
                self.generation
            );
            return false;
        }

        self.is_loading = false;

        match result {
            Ok(page) => {
                log::debug!(
                    "[{}] loaded {} items on page {}",
                    self.label,
                    page.data.len(),
                    ticket.page.page
                );
                self.items = page.data;
                self.total = page.total;
                self.stale = false;
                if let Some(id) = self.selected.clone() {
                    if self.find(&id).is_none() {
                        self.selected = None;
                    }
                }
                true
            }
            Err(e) => {
                log::warn!("[{}] failed to load items: {}", self.label, e);
                self.notify(Notice::error(e.user_message()));
                false
            }
        }
    }

    /// Supersede any fetch in flight.
    fn invalidate(&mut self) {
        self.generation += 1;
        self.is_loading = false;
        self.stale = true;
    }
}

impl<F, S> ListController<F, S>
where
    F: ListFilter,
    S: ListSource<F::Query, F::Item> + ?Sized,
{
    /// Fetch the current page. Returns `true` when fresh items were applied.
    pub async fn load_items(&mut self) -> bool {
        let ticket = self.begin_load();
        let source = Arc::clone(&self.source);
        let result = source.fetch_page(&ticket.query, ticket.page).await;
        self.finish_load(ticket, result)
    }

    /// Fetch only if the cached page is stale.
    pub async fn refresh_if_stale(&mut self) -> bool {
        if self.stale {
            self.load_items().await
        } else {
            false
        }
    }

    /// Merge a filter patch and fetch when the change requires it.
    pub async fn apply_filter(&mut self, patch: F::Patch) -> FilterChange {
        let change = self.update_filter(patch);
        if change.needs_fetch {
            self.load_items().await;
        }
        change
    }

    /// Move to a page and fetch it.
    pub async fn go_to_page(&mut self, page: u32) -> bool {
        if self.set_page(page) {
            self.load_items().await
        } else {
            false
        }
    }

    pub async fn next_page(&mut self) -> bool {
        let page = self.page.saturating_add(1);
        self.go_to_page(page).await
    }

    pub async fn prev_page(&mut self) -> bool {
        let page = self.page.saturating_sub(1);
        self.go_to_page(page).await
    }
}
