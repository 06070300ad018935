//! Chillers - list controllers and edit reconciliation for the Chillers
//! community backend.
//!
//! The crate holds everything a screen needs between renders: paginated and
//! filtered lists, local edit overlays, and the HTTP client that backs them.
//! Rendering is left to the embedding UI.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod views;

pub use config::ClientConfig;
pub use error::AppError;
pub use views::Screens;
