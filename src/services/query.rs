//! Query builder for the data API.
//!
//! Produces PostgREST-style query parameters: `col=eq.value`,
//! `col=ilike.*term*`, `or=(a.ilike.*x*,b.ilike.*x*)`, `order=col.desc`.

/// Characters with meaning inside PostgREST filter values.
const RESERVED: &[char] = &['*', '%', ',', '(', ')', '"', '\\'];

/// A select with filters and ordering. Pagination is applied separately
/// through the `Range` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<(String, bool)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column list, e.g. `*,memberships(*)`. Defaults to `*`.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    /// `column = value`.
    pub fn eq(mut self, column: &str, value: impl AsRef<str>) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.as_ref())));
        self
    }

    /// `column = value` when a value is given.
    pub fn eq_opt(self, column: &str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Case-insensitive substring match. Blank terms add no filter.
    pub fn ilike(mut self, column: &str, term: &str) -> Self {
        if let Some(pattern) = contains_pattern(term) {
            self.filters
                .push((column.to_string(), format!("ilike.{}", pattern)));
        }
        self
    }

    /// Case-insensitive substring match against any of `columns`.
    pub fn search_any(mut self, columns: &[&str], term: &str) -> Self {
        if let Some(pattern) = contains_pattern(term) {
            let clauses: Vec<String> = columns
                .iter()
                .map(|c| format!("{}.ilike.{}", c, pattern))
                .collect();
            self.filters
                .push(("or".to_string(), format!("({})", clauses.join(","))));
        }
        self
    }

    /// `column >= value`.
    pub fn gte(mut self, column: &str, value: impl AsRef<str>) -> Self {
        self.filters
            .push((column.to_string(), format!("gte.{}", value.as_ref())));
        self
    }

    /// `column <= value`.
    pub fn lte(mut self, column: &str, value: impl AsRef<str>) -> Self {
        self.filters
            .push((column.to_string(), format!("lte.{}", value.as_ref())));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// Query-string pairs, ready for `RequestBuilder::query`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        params.push((
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        ));
        params.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(col, asc)| format!("{}.{}", col, if *asc { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        params
    }
}

/// `*term*` with reserved characters stripped, or `None` for a blank term.
fn contains_pattern(term: &str) -> Option<String> {
    let cleaned: String = term.trim().chars().filter(|c| !RESERVED.contains(c)).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(format!("*{}*", cleaned))
    }
}

/// Parse the total from a `Content-Range` header such as `0-19/57` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.split_once('/')?;
    total.trim().parse().ok()
}
