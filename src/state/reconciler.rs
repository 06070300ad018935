//! Local edit overlays and their reconciliation with the server.
//!
//! An [`EditReconciler`] maps entity ids to an overlay: a local, unsaved copy
//! of the editable fields. Each overlay remembers the values it was seeded
//! from, so a save sends only what changed and a reload can tell whether the
//! server moved underneath the edit.

use std::collections::HashMap;
use std::future::Future;

use crate::error::AppError;
use crate::models::Identified;

/// Editable fields of one entity type.
pub trait Overlay: Clone + PartialEq {
    type Entity: Identified;

    /// Partial update; `Default` means "nothing changed".
    type Patch: Default + PartialEq;

    /// Overlay holding the entity's current values.
    fn seed(entity: &Self::Entity) -> Self;

    /// Shallow-merge a patch into the overlay.
    fn merge(&mut self, patch: Self::Patch);

    /// Local checks run before any network call. Fields still equal to
    /// `base` are not checked, so a server value that breaks a local rule
    /// never blocks edits to other fields.
    fn validate(&self, base: &Self) -> Result<(), AppError>;

    /// Fields that differ from `base`.
    fn diff(&self, base: &Self) -> Self::Patch;

    /// Write the overlay onto a copy of the entity for display.
    fn apply(&self, entity: &mut Self::Entity);
}

#[derive(Debug, Clone)]
struct Entry<O> {
    base: O,
    current: O,
}

/// Result of saving one overlay.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// The server accepted the change; the overlay is gone.
    Saved,
    /// Nothing differed from the seed; the overlay was dropped without a call.
    Unchanged,
    /// Local validation failed; no call was made and the overlay stays.
    Invalid(AppError),
    /// The server rejected the change; the overlay stays.
    Failed(AppError),
    /// No edit in progress for that id.
    NotEditing,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved | Self::Unchanged)
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Self::Invalid(e) | Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Aggregate result of a batch save.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub saved: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<(String, AppError)>,
}

impl BatchReport {
    pub fn record(&mut self, id: &str, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Saved => self.saved.push(id.to_string()),
            SaveOutcome::Unchanged | SaveOutcome::NotEditing => {
                self.unchanged.push(id.to_string())
            }
            SaveOutcome::Invalid(e) | SaveOutcome::Failed(e) => {
                self.failed.push((id.to_string(), e))
            }
        }
    }

    /// Nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.unchanged.is_empty() && self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Overlay map plus per-id errors.
#[derive(Debug, Clone)]
pub struct EditReconciler<O: Overlay> {
    entries: HashMap<String, Entry<O>>,
    errors: HashMap<String, AppError>,
}

impl<O: Overlay> Default for EditReconciler<O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            errors: HashMap::new(),
        }
    }
}

impl<O: Overlay> EditReconciler<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an overlay from the entity. An edit already in progress is kept.
    /// Returns whether a new overlay was created.
    pub fn begin_edit(&mut self, entity: &O::Entity) -> bool {
        let id = entity.id();
        if self.entries.contains_key(id) {
            return false;
        }
        let seed = O::seed(entity);
        self.entries.insert(
            id.to_string(),
            Entry {
                base: seed.clone(),
                current: seed,
            },
        );
        true
    }

    /// Merge a patch into an existing overlay and clear its error.
    /// Returns `false` when no edit is in progress for `id`.
    pub fn update_edit(&mut self, id: &str, patch: O::Patch) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.current.merge(patch);
                self.errors.remove(id);
                true
            }
            None => false,
        }
    }

    /// Drop the overlay and its error. Never contacts the server.
    pub fn cancel_edit(&mut self, id: &str) -> bool {
        self.errors.remove(id);
        self.entries.remove(id).is_some()
    }

    pub fn is_editing(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn has_pending(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of ids with overlays, sorted for a stable save order.
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn overlay(&self, id: &str) -> Option<&O> {
        self.entries.get(id).map(|e| &e.current)
    }

    pub fn error(&self, id: &str) -> Option<&AppError> {
        self.errors.get(id)
    }

    pub fn set_error(&mut self, id: &str, error: AppError) {
        self.errors.insert(id.to_string(), error);
    }

    /// The entity as the user currently sees it.
    pub fn display(&self, entity: &O::Entity) -> O::Entity
    where
        O::Entity: Clone,
    {
        let mut shown = entity.clone();
        if let Some(entry) = self.entries.get(entity.id()) {
            entry.current.apply(&mut shown);
        }
        shown
    }

    /// Drop every overlay and error.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.errors.clear();
    }

    /// Prune overlays after a reload. An overlay survives only if its entity
    /// is still present with exactly the values the overlay was seeded from.
    /// Returns the ids that were dropped.
    pub fn reconcile<'a, I>(&mut self, entities: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a O::Entity>,
        O::Entity: 'a,
    {
        let fresh: HashMap<&str, O> = entities
            .into_iter()
            .filter(|e| self.entries.contains_key(e.id()))
            .map(|e| (e.id(), O::seed(e)))
            .collect();

        let dropped: Vec<String> = self
            .entries
            .iter()
            .filter(|(id, entry)| fresh.get(id.as_str()) != Some(&entry.base))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &dropped {
            self.entries.remove(id);
            self.errors.remove(id);
        }
        dropped
    }

    /// Validate and persist one overlay.
    ///
    /// `persist` receives only the changed fields and is not called at all
    /// when validation fails or nothing changed. On success the overlay and
    /// its error are removed; on failure both are kept for the user to fix.
    pub async fn save<P, Fut>(&mut self, id: &str, persist: P) -> SaveOutcome
    where
        P: FnOnce(O::Patch) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let Some(entry) = self.entries.get(id) else {
            return SaveOutcome::NotEditing;
        };

        if let Err(e) = entry.current.validate(&entry.base) {
            self.errors.insert(id.to_string(), e.clone());
            return SaveOutcome::Invalid(e);
        }

        let patch = entry.current.diff(&entry.base);
        if patch == O::Patch::default() {
            self.entries.remove(id);
            self.errors.remove(id);
            return SaveOutcome::Unchanged;
        }

        match persist(patch).await {
            Ok(()) => {
                self.entries.remove(id);
                self.errors.remove(id);
                SaveOutcome::Saved
            }
            Err(e) => {
                self.errors.insert(id.to_string(), e.clone());
                SaveOutcome::Failed(e)
            }
        }
    }
}
