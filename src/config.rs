//! Client configuration.
//!
//! Settings are persisted as JSON. Missing keys fall back to defaults and
//! `CHILLERS_*` environment variables override whatever the file says.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default rows per page for every list.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page the data API will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Connection and paging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,

    /// Public anon key sent as the `apikey` header.
    pub anon_key: String,

    /// Session access token. Falls back to the anon key when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Rows per page for every list built by
    /// [`Screens::new`](crate::views::Screens::new).
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            anon_key: String::new(),
            access_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load settings from a JSON file, apply env overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|e| AppError::config(format!("Invalid settings file: {}", e)))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Persist settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            AppError::config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Apply `CHILLERS_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CHILLERS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = lookup("CHILLERS_ANON_KEY") {
            self.anon_key = key;
        }
        if let Some(token) = lookup("CHILLERS_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(secs) = lookup("CHILLERS_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeout_secs = secs;
        }
        if let Some(size) = lookup("CHILLERS_PAGE_SIZE").and_then(|s| s.parse().ok()) {
            self.page_size = size;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::config("base_url is required"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::config("base_url must start with http:// or https://"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::config("timeout_secs must be greater than zero"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::config(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Token for the `Authorization` header.
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }
}
