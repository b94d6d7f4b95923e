pub mod extract;
pub mod sanitize;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{ChatError, FetchError};

use types::{Article, SearchResult};

const DEFAULT_SEARCH_BASE: &str = "https://www.marketwatch.com";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Anything that can GET a page body. One attempt per call, no retries.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// `PageSource` over reqwest with a per-request timeout.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

pub struct NewsConfig {
    pub search_base: Url,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl NewsConfig {
    pub fn from_env() -> Result<Self> {
        let search_base = dotenv::var("NEWS_SEARCH_BASE")
            .unwrap_or_else(|_| DEFAULT_SEARCH_BASE.to_string());
        let search_base = Url::parse(&search_base)
            .with_context(|| format!("Invalid NEWS_SEARCH_BASE: {}", search_base))?;
        let fetch_timeout = dotenv::var("NEWS_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        let user_agent = dotenv::var("NEWS_USER_AGENT")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            search_base,
            fetch_timeout: Duration::from_secs(fetch_timeout),
            user_agent,
        })
    }
}

/// Searches the news site and turns result pages into article text.
pub struct NewsClient {
    pages: Arc<dyn PageSource>,
    search_base: Url,
}

impl NewsClient {
    pub fn new(pages: Arc<dyn PageSource>, search_base: Url) -> Self {
        Self { pages, search_base }
    }

    pub fn from_config(config: &NewsConfig) -> Result<Self> {
        let pages = HttpPageSource::new(config.fetch_timeout, &config.user_agent)?;
        Ok(Self::new(Arc::new(pages), config.search_base.clone()))
    }

    /// `sanitized_query` must already be URL-safe (see [`sanitize::sanitize`]).
    pub fn search_url(&self, sanitized_query: &str) -> String {
        format!(
            "{}/search?q={}&ts=0&tab=All%20News",
            self.search_base.as_str().trim_end_matches('/'),
            sanitized_query
        )
    }

    /// Run the search and return the top `limit` results in rank order.
    pub async fn retrieve(
        &self,
        sanitized_query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ChatError> {
        let url = self.search_url(sanitized_query);
        debug!(url, "searching news");

        let page = self
            .pages
            .get(&url)
            .await
            .map_err(|e| ChatError::search_unavailable(format!("{}: {}", url, e)))?;

        let results = extract::extract_search_results(&page, &self.search_base, limit);
        if results.is_empty() {
            warn!(url, "search page had no article headlines");
        }
        Ok(results)
    }

    /// Fetch one article and extract its body text.
    pub async fn fetch_article(&self, link: &str) -> Result<String, FetchError> {
        let html = self.pages.get(link).await?;
        Ok(extract::extract_article_text(&html))
    }

    /// Fetch every result concurrently. The returned articles keep the order of
    /// `results`. A failed fetch becomes an empty article unless `strict`.
    pub async fn gather(
        &self,
        results: &[SearchResult],
        strict: bool,
    ) -> Result<Vec<Article>, ChatError> {
        let fetched = join_all(results.iter().map(|r| self.fetch_article(&r.link))).await;

        let mut articles = Vec::with_capacity(results.len());
        for (result, outcome) in results.iter().zip(fetched) {
            match outcome {
                Ok(text) => {
                    debug!(link = %result.link, chars = text.len(), "article extracted");
                    articles.push(Article {
                        link: result.link.clone(),
                        text,
                    });
                }
                Err(e) if strict => {
                    return Err(ChatError::ArticleFetch {
                        url: result.link.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(link = %result.link, error = %e, "article fetch failed, using empty text");
                    articles.push(Article::empty(&result.link));
                }
            }
        }

        info!(
            requested = results.len(),
            with_text = articles.iter().filter(|a| !a.text.is_empty()).count(),
            "articles gathered"
        );
        Ok(articles)
    }
}
