//! Small pieces of per-view state that never touch the server.

use serde::Serialize;

/// Ids of rows whose detail area is expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandedRows {
    ids: Vec<String>,
}

impl ExpandedRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a row. Returns whether it is now expanded.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.is_expanded(id) {
            self.ids.retain(|x| x != id);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn collapse_all(&mut self) {
        self.ids.clear();
    }

    /// Forget rows that are no longer listed.
    pub fn retain_listed<'a>(&mut self, listed: impl IntoIterator<Item = &'a str>) {
        let listed: Vec<&str> = listed.into_iter().collect();
        self.ids.retain(|id| listed.contains(&id.as_str()));
    }
}

/// The one entity whose edit form is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActiveEditor {
    current: Option<String>,
}

impl ActiveEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` the active entity.
    ///
    /// Returns the previously active id when it differs; the caller must
    /// discard that entity's in-progress edits.
    pub fn activate(&mut self, id: &str) -> Option<String> {
        match self.current.as_deref() {
            Some(current) if current == id => None,
            _ => self.current.replace(id.to_string()),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.current.as_deref() == Some(id)
    }

    /// Release the slot if `id` holds it.
    pub fn release(&mut self, id: &str) {
        if self.is_active(id) {
            self.current = None;
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
