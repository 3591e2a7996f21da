//! Campaign attribution attached to every step save.

use std::fmt;

use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use uuid::Uuid;

/// Visitor session id, `franchise_<unix millis>_<9 random chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!(
            "franchise_{}_{}",
            Utc::now().timestamp_millis(),
            &random[..9]
        ))
    }

    /// Reuse an id kept by the caller (e.g. from session storage).
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UTM parameters and landing context, flattened into each save body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_term: String,
    pub utm_content: String,
    pub referrer: String,
    pub landing_page: String,
    pub session_id: SessionId,
}

impl Attribution {
    /// Read the UTM parameters from the landing page URL. Missing parameters are
    /// empty; an unparsable URL is kept as the landing page with no UTM data.
    pub fn from_landing(landing_page: &str, referrer: &str, session_id: SessionId) -> Self {
        let mut attribution = Self {
            utm_source: String::new(),
            utm_medium: String::new(),
            utm_campaign: String::new(),
            utm_term: String::new(),
            utm_content: String::new(),
            referrer: referrer.to_string(),
            landing_page: landing_page.to_string(),
            session_id,
        };

        let url = match Url::parse(landing_page) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(landing_page, error = %e, "Unparsable landing page URL");
                return attribution;
            }
        };

        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "utm_source" => &mut attribution.utm_source,
                "utm_medium" => &mut attribution.utm_medium,
                "utm_campaign" => &mut attribution.utm_campaign,
                "utm_term" => &mut attribution.utm_term,
                "utm_content" => &mut attribution.utm_content,
                _ => continue,
            };
            // First occurrence wins, like URLSearchParams.get
            if slot.is_empty() {
                *slot = value.into_owned();
            }
        }

        attribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "franchise");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn test_utm_from_landing() {
        let attribution = Attribution::from_landing(
            "https://agenciakaizen.com.br/franquia/?utm_source=google&utm_medium=cpc&utm_campaign=franquia%202025&utm_source=bing",
            "https://www.google.com/",
            SessionId::from_existing("franchise_1_abcdefghi"),
        );
        assert_eq!(attribution.utm_source, "google");
        assert_eq!(attribution.utm_medium, "cpc");
        assert_eq!(attribution.utm_campaign, "franquia 2025");
        assert_eq!(attribution.utm_term, "");
        assert_eq!(attribution.referrer, "https://www.google.com/");

        let body = serde_json::to_value(&attribution).unwrap();
        assert_eq!(body["session_id"], "franchise_1_abcdefghi");
        assert_eq!(body["utm_content"], "");
    }

    #[test]
    fn test_bad_landing_url() {
        let attribution =
            Attribution::from_landing("not a url", "", SessionId::from_existing("s"));
        assert_eq!(attribution.landing_page, "not a url");
        assert_eq!(attribution.utm_source, "");
    }
}
