//! Paginated list shape shared by every list endpoint, and the query that
//! requests it.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters left unescaped in query values (RFC 3986 unreserved set).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One page of a list endpoint.
///
/// On the wire this is `{ "data": [...], "total": n, "page": p, "limit": l, "pages": k }`;
/// only `data` and `total` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    /// Items of this page, in server order
    #[serde(rename = "data", default = "Vec::new")]
    pub items: Vec<T>,

    /// Count of all matching items across all pages
    #[serde(default)]
    pub total: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            total,
            page: None,
            limit: None,
            pages: None,
        }
    }

    /// The page returned when the API is unreachable.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enforce `items.len() <= total`, raising `total` when the server
    /// under-reports it.
    pub fn normalized(mut self) -> Self {
        let len = self.items.len() as u64;
        if len > self.total {
            tracing::warn!(
                items = len,
                total = self.total,
                "List page reports fewer total items than it contains"
            );
            self.total = len;
        }
        self
    }
}

/// Query parameters understood by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
}

impl ListParams {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = Some(is_featured);
        self
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = Some(is_published);
        self
    }

    /// Render as a query string, including the leading `?`, or an empty string
    /// when no parameter is set.
    pub fn to_query(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(is_active) = self.is_active {
            pairs.push(("is_active", is_active.to_string()));
        }
        if let Some(is_featured) = self.is_featured {
            pairs.push(("is_featured", is_featured.to_string()));
        }
        if let Some(is_published) = self.is_published {
            pairs.push(("is_published", is_published.to_string()));
        }
        encode_query(&pairs)
    }
}

/// Encode `pairs` as `?k=v&k2=v2`, or an empty string.
pub(crate) fn encode_query(pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, utf8_percent_encode(v, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&");
    format!("?{joined}")
}

/// Percent-encode a single path segment (slugs).
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, QUERY_VALUE).to_string()
}
