//! HTTP client for the Chillers backend.
//!
//! Two surfaces share one `reqwest::Client`:
//! - the data API (`/rest/v1/{table}`), queried with [`Query`] and paginated
//!   through the `Range` header;
//! - the app's REST endpoints (`/api/...`), which answer with a
//!   `{data?, error?}` envelope.

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::models::{Page, PageRequest};
use crate::services::query::{parse_content_range_total, Query};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Envelope returned by the REST endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Backend API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new client. The config is validated first.
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();

        let api_key = header::HeaderValue::from_str(&config.anon_key)
            .map_err(|_| AppError::authentication("Invalid API key format"))?;
        headers.insert("apikey", api_key);

        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.bearer_token()))
            .map_err(|_| AppError::authentication("Invalid access token format"))?;
        headers.insert(header::AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// URL of a data API table.
    fn rest_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table
        )
    }

    /// URL of a REST endpoint, e.g. `/bug-reports`.
    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Path of a single resource, with the id percent-encoded.
    fn resource_path(resource: &str, id: &str) -> String {
        format!("{}/{}", resource, urlencoding::encode(id))
    }

    /// Select one page of rows from a table.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        page: PageRequest,
    ) -> Result<Page<T>, AppError> {
        let (from, to) = page.range();
        let endpoint = format!("/rest/v1/{}", table);
        log::debug!("[api] select {} rows {}-{}", table, from, to);

        let response = self
            .client
            .get(self.rest_url(table))
            .query(&query.to_params())
            .header("Range-Unit", "items")
            .header(header::RANGE, format!("{}-{}", from, to))
            .header("Prefer", "count=exact")
            .send()
            .await?;

        // 416 means the page starts past the last row
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = Self::parse_total(&response);
            return Ok(Page::new(Vec::new(), total));
        }

        let total = Self::parse_total(&response);
        let data = Self::handle_rows::<Vec<T>>(response, &endpoint).await?;
        Ok(Page::new(data, total))
    }

    /// Select every row matching the query, unpaginated.
    pub async fn select_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let endpoint = format!("/rest/v1/{}", table);
        let response = self
            .client
            .get(self.rest_url(table))
            .query(&query.to_params())
            .send()
            .await?;
        Self::handle_rows(response, &endpoint).await
    }

    /// `POST /api{resource}`; returns the created entity.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .client
            .post(self.api_url(resource))
            .json(body)
            .send()
            .await?;
        Self::require_data(Self::handle_envelope(response, resource).await?, resource)
    }

    /// `PATCH /api{resource}/{id}`; returns the updated entity if the endpoint sent one.
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        body: &B,
    ) -> Result<Option<T>, AppError> {
        let path = Self::resource_path(resource, id);
        let response = self
            .client
            .patch(self.api_url(&path))
            .json(body)
            .send()
            .await?;
        Self::handle_envelope(response, &path).await
    }

    /// `DELETE /api{resource}/{id}`.
    pub async fn delete(&self, resource: &str, id: &str) -> Result<(), AppError> {
        let path = Self::resource_path(resource, id);
        let response = self.client.delete(self.api_url(&path)).send().await?;
        Self::handle_envelope::<serde_json::Value>(response, &path).await?;
        Ok(())
    }

    /// Parse the row total from the `Content-Range` header.
    fn parse_total(response: &Response) -> Option<u64> {
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
    }

    /// Handle a data API response.
    async fn handle_rows<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(error_for_status(status, &body, endpoint))
        }
    }

    /// Handle a REST endpoint response, unwrapping the envelope.
    async fn handle_envelope<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<Option<T>, AppError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(error_for_status(status, &body, endpoint));
        }

        if body.trim().is_empty() || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))?;

        match envelope.error {
            Some(err) if !err.is_null() => Err(AppError::api_full(
                error_text(&err),
                status.as_u16(),
                endpoint,
            )),
            _ => Ok(envelope.data),
        }
    }

    fn require_data<T>(data: Option<T>, endpoint: &str) -> Result<T, AppError> {
        data.ok_or_else(|| AppError::internal(format!("{} returned no data", endpoint)))
    }
}

/// Map a non-2xx response to an error.
///
/// The data API reports `{"message": ...}`; REST endpoints report
/// `{"error": ...}` where the value is a string or an object.
pub fn error_for_status(status: StatusCode, body: &str, endpoint: &str) -> AppError {
    let status_code = status.as_u16();
    let body_message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").or_else(|| v.get("message")).map(error_text));

    match (status, body_message) {
        (StatusCode::UNAUTHORIZED, _) => {
            AppError::authentication("Session expired or invalid. Please sign in again.")
        }
        (StatusCode::FORBIDDEN, _) => AppError::forbidden(format!("Access denied to {}", endpoint)),
        (StatusCode::NOT_FOUND, _) => AppError::not_found(endpoint.to_string()),
        (StatusCode::TOO_MANY_REQUESTS, _) => {
            AppError::api_full("Rate limit exceeded", status_code, endpoint)
        }
        (_, Some(msg)) => AppError::api_full(msg, status_code, endpoint),
        _ => AppError::api_full(
            format!("Request failed ({}): {}", status_code, body),
            status_code,
            endpoint,
        ),
    }
}

/// Text of an error value: a plain string, `{"message": ...}`, or raw JSON.
fn error_text(value: &serde_json::Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}
