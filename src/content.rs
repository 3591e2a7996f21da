//! Typed client for the read-only content API.
//!
//! Every read goes through [`ContentApi::get_json`], which applies the fixed list
//! timeout and turns non-2xx statuses into [`KaizenError::HttpStatus`]. The
//! `*_or_empty` variants are meant for server-rendered seed pages: when the API is
//! unreachable they log a warning and return an empty page instead of failing.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::SiteConfig;
use crate::domain::page::{encode_query, encode_segment};
use crate::domain::{Article, Company, ListPage, ListParams, Location};
use crate::error::{KaizenError, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::loader::PageSource;

/// Client for `/articles`, `/companies` and `/locations`.
#[derive(Clone)]
pub struct ContentApi<H: HttpClient> {
    http: H,
    base_url: String,
    timeout_ms: u64,
}

impl<H: HttpClient> ContentApi<H> {
    pub fn new(http: H, config: &SiteConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.clone(),
            timeout_ms: config.list_timeout_ms,
        }
    }

    pub async fn articles(&self, params: &ListParams) -> Result<ListPage<Article>> {
        let page: ListPage<Article> = self
            .get_json(&format!("/articles{}", params.to_query()))
            .await?;
        Ok(page.normalized())
    }

    pub async fn companies(&self, params: &ListParams) -> Result<ListPage<Company>> {
        let page: ListPage<Company> = self
            .get_json(&format!("/companies{}", params.to_query()))
            .await?;
        Ok(page.normalized())
    }

    pub async fn locations(
        &self,
        is_active: Option<bool>,
        is_main_office: Option<bool>,
    ) -> Result<ListPage<Location>> {
        let mut pairs = Vec::new();
        if let Some(is_active) = is_active {
            pairs.push(("is_active", is_active.to_string()));
        }
        if let Some(is_main_office) = is_main_office {
            pairs.push(("is_main_office", is_main_office.to_string()));
        }
        let page: ListPage<Location> = self
            .get_json(&format!("/locations{}", encode_query(&pairs)))
            .await?;
        Ok(page.normalized())
    }

    pub async fn article(&self, slug: &str) -> Result<Article> {
        self.get_json(&format!("/articles/{}", encode_segment(slug)))
            .await
    }

    pub async fn company(&self, slug: &str) -> Result<Company> {
        self.get_json(&format!("/companies/{}", encode_segment(slug)))
            .await
    }

    /// [`articles`](Self::articles), degrading transport failures to an empty page.
    pub async fn articles_or_empty(&self, params: &ListParams) -> Result<ListPage<Article>> {
        degrade_unreachable(self.articles(params).await, "/articles")
    }

    /// [`companies`](Self::companies), degrading transport failures to an empty page.
    pub async fn companies_or_empty(&self, params: &ListParams) -> Result<ListPage<Company>> {
        degrade_unreachable(self.companies(params).await, "/companies")
    }

    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = HttpRequest::get(&self.base_url, path);
        let response = self.http.execute(&request, Some(self.timeout_ms)).await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "Content API returned an error status");
            return Err(KaizenError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

fn degrade_unreachable<T>(result: Result<ListPage<T>>, path: &str) -> Result<ListPage<T>> {
    match result {
        Err(e) if e.is_network() => {
            tracing::warn!(path, error = %e, "Content API unreachable, using an empty page");
            Ok(ListPage::empty())
        }
        other => other,
    }
}

/// Published articles, optionally restricted to one category.
#[derive(Clone)]
pub struct ArticleFeed<H: HttpClient> {
    api: ContentApi<H>,
    category: Option<String>,
}

impl<H: HttpClient> ArticleFeed<H> {
    pub fn new(api: ContentApi<H>) -> Self {
        Self {
            api,
            category: None,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn params(&self, page: u32, limit: u32) -> ListParams {
        let params = ListParams::default().page(page).limit(limit);
        let params = match &self.category {
            Some(category) => params.category(category.clone()),
            None => params,
        };
        params.published(true)
    }
}

#[async_trait]
impl<H: HttpClient> PageSource<Article> for ArticleFeed<H> {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ListPage<Article>> {
        self.api.articles(&self.params(page, limit)).await
    }

    fn name(&self) -> &str {
        "articles"
    }
}

/// Active companies, optionally restricted to one category.
#[derive(Clone)]
pub struct CompanyFeed<H: HttpClient> {
    api: ContentApi<H>,
    category: Option<String>,
}

impl<H: HttpClient> CompanyFeed<H> {
    pub fn new(api: ContentApi<H>) -> Self {
        Self {
            api,
            category: None,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[async_trait]
impl<H: HttpClient> PageSource<Company> for CompanyFeed<H> {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ListPage<Company>> {
        let params = ListParams::default().page(page).limit(limit);
        let params = match &self.category {
            Some(category) => params.category(category.clone()),
            None => params,
        };
        self.api.companies(&params.active(true)).await
    }

    fn name(&self) -> &str {
        "companies"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use serde_json::json;

    fn api(mock: &MockHttpClient) -> ContentApi<MockHttpClient> {
        let config = SiteConfig {
            api_base_url: "https://api.example.com/api/v1".to_string(),
            ..Default::default()
        };
        ContentApi::new(mock.clone(), &config)
    }

    fn article(id: &str) -> serde_json::Value {
        json!({"id": id, "title": format!("Artigo {id}"), "slug": format!("artigo-{id}")})
    }

    #[tokio::test]
    async fn test_articles_uses_list_timeout() {
        let mock = MockHttpClient::new();
        mock.add_json(
            "GET /articles?page=1&limit=12&is_published=true",
            200,
            json!({"data": [article("1")], "total": 1}),
        );

        let page = api(&mock)
            .articles(&ListParams::default().page(1).limit(12).published(true))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let calls = mock.get_calls();
        assert_eq!(calls[0].timeout_ms, Some(5000));
        assert_eq!(calls[0].endpoint, "https://api.example.com/api/v1");
    }

    #[tokio::test]
    async fn test_companies_query() {
        let mock = MockHttpClient::new();
        mock.add_json(
            "GET /companies?limit=50&is_active=true",
            200,
            json!({"data": [], "total": 0}),
        );

        let page = api(&mock)
            .companies(&ListParams::default().limit(50).active(true))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mock = MockHttpClient::new();
        mock.add_response(
            "GET /articles/nao-existe",
            Ok(HttpResponse::new(404, r#"{"detail":"Not found"}"#)),
        );

        let err = api(&mock).article("nao-existe").await.unwrap_err();
        assert!(matches!(err, KaizenError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_slug_is_encoded() {
        let mock = MockHttpClient::new();
        mock.add_json(
            "GET /companies/caf%C3%A9",
            200,
            json!({"id": "1", "name": "Café", "slug": "café"}),
        );
        let company = api(&mock).company("café").await.unwrap();
        assert_eq!(company.name, "Café");
    }

    #[tokio::test]
    async fn test_or_empty_degrades_network_failures_only() {
        let mock = MockHttpClient::new();
        mock.add_response("GET /articles", Err(KaizenError::Timeout(5000)));
        mock.add_response("GET /companies", Ok(HttpResponse::new(500, "boom")));

        let api = api(&mock);
        let page = api.articles_or_empty(&ListParams::default()).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);

        let err = api
            .companies_or_empty(&ListParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, KaizenError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_article_feed_category() {
        let mock = MockHttpClient::new();
        mock.add_json(
            "GET /articles?page=3&limit=12&category=seo&is_published=true",
            200,
            json!({"data": [article("25")], "total": 25}),
        );

        let feed = ArticleFeed::new(api(&mock)).in_category("seo");
        let page = feed.fetch_page(3, 12).await.unwrap();
        assert_eq!(page.items[0].id, "25");
        assert_eq!(feed.name(), "articles");
    }

    #[tokio::test]
    async fn test_company_feed_filters_active() {
        let mock = MockHttpClient::new();
        mock.add_json(
            "GET /companies?page=2&limit=12&is_active=true",
            200,
            json!({"data": [], "total": 3}),
        );

        let page = CompanyFeed::new(api(&mock)).fetch_page(2, 12).await.unwrap();
        assert!(page.is_empty());
    }
}
