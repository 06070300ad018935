//! Framework-independent view state.
//!
//! These types hold what a list screen needs between renders. They never
//! touch the network on their own: fetches go through the injected sources.

pub mod list_controller;
pub mod reconciler;
pub mod view_state;

pub use list_controller::{
    FilterChange, FilterDelta, ListController, ListFilter, ListSource, LoadTicket,
};
pub use reconciler::{BatchReport, EditReconciler, Overlay, SaveOutcome};
pub use view_state::{ActiveEditor, ExpandedRows};
