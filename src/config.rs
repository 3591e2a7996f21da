//! Site-wide client configuration.

use serde::{Deserialize, Serialize};

/// Default base URL of the content API.
pub const DEFAULT_API_BASE_URL: &str = "https://site2025.agenciakaizen.com.br/api/v1";

/// Default base URL of the site backend that serves the franchise endpoints.
pub const DEFAULT_SITE_BASE_URL: &str = "https://agenciakaizen.com.br";

/// Configuration shared by the content client, the list loader and the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the content API (articles, companies, locations)
    pub api_base_url: String,

    /// Base URL of the site backend (franchise endpoints)
    pub site_base_url: String,

    /// Number of items requested per page by the list loader
    pub page_size: u32,

    /// Timeout for content API reads in milliseconds. A timeout is handled
    /// exactly like any other failed read.
    pub list_timeout_ms: u64,

    /// Optional timeout for wizard saves and the final submit.
    /// None means rely on the transport's own error handling.
    pub save_timeout_ms: Option<u64>,

    /// Extra margin around the viewport, in pixels, for scroll-triggered loading
    pub intersection_root_margin_px: f64,

    /// Visible fraction of the trigger element needed to count as intersecting
    pub intersection_threshold: f64,

    /// CSRF token sent with franchise POSTs as `X-CSRFToken`
    pub csrf_token: Option<String>,

    /// How long the per-step success notice stays up (milliseconds)
    pub step_notice_ms: u64,

    /// How long the completion notice stays up (milliseconds)
    pub completion_notice_ms: u64,

    /// How long error notices stay up (milliseconds)
    pub error_notice_ms: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
            page_size: 12,
            list_timeout_ms: 5000,
            save_timeout_ms: None,
            intersection_root_margin_px: 100.0,
            intersection_threshold: 0.1,
            csrf_token: None,
            step_notice_ms: 2000,
            completion_notice_ms: 5000,
            error_notice_ms: 5000,
        }
    }
}

impl SiteConfig {
    /// Defaults overridden by `KAIZEN_API_URL`, `KAIZEN_SITE_URL` and
    /// `KAIZEN_CSRF_TOKEN` when they are set and non-empty.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("KAIZEN_API_URL") {
            tracing::debug!(api_base_url = %url, "Using content API URL from environment");
            self.api_base_url = url;
        }
        if let Some(url) = get("KAIZEN_SITE_URL") {
            tracing::debug!(site_base_url = %url, "Using site URL from environment");
            self.site_base_url = url;
        }
        if let Some(token) = get("KAIZEN_CSRF_TOKEN") {
            self.csrf_token = Some(token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SiteConfig::default();
        assert_eq!(config.page_size, 12);
        assert_eq!(config.list_timeout_ms, 5000);
        assert_eq!(config.save_timeout_ms, None);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_overrides_skip_blank_values() {
        let config = SiteConfig::default().with_overrides(|key| match key {
            "KAIZEN_API_URL" => Some("http://localhost:8000/api/v1".to_string()),
            "KAIZEN_SITE_URL" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.site_base_url, DEFAULT_SITE_BASE_URL);
        assert_eq!(config.csrf_token, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SiteConfig =
            serde_json::from_str(r#"{"page_size": 24, "save_timeout_ms": 10000}"#).unwrap();
        assert_eq!(config.page_size, 24);
        assert_eq!(config.save_timeout_ms, Some(10000));
        assert_eq!(config.list_timeout_ms, 5000);
    }
}
