use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use wd_core::models::{ArticleUpsert, Source, SourceKind};
use wd_core::store::{ArticleStore, SourceStore};
use wd_core::{Error, PipelineConfig, Result};

use crate::extract;
use crate::ratelimit::RateLimiter;
use crate::robots::RobotsChecker;

/// Per-source scrape result.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source_id: Uuid,
    pub source_url: String,
    pub collected: u32,
    pub errors: Vec<String>,
}

/// Flattened error record handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct ScrapeError {
    pub source_url: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub total_collected: u32,
    pub source_results: Vec<SourceOutcome>,
    pub errors: Vec<ScrapeError>,
}

/// The scrape stage: fetches every configured source, extracts and
/// sanitizes article content, and upserts articles by URL. At most
/// `max_concurrent_sources` sources are in flight; articles within one
/// source are fetched sequentially under the per-origin rate limit.
pub struct Scraper {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    robots: RobotsChecker,
    articles: Arc<dyn ArticleStore>,
    sources: Arc<dyn SourceStore>,
    config: PipelineConfig,
}

impl Scraper {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        sources: Arc<dyn SourceStore>,
        config: PipelineConfig,
    ) -> Self {
        let client = reqwest::Client::new();
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_interval));
        let robots = RobotsChecker::new(
            client.clone(),
            limiter.clone(),
            config.robots_timeout,
            config.user_agent.clone(),
        );
        Self {
            client,
            limiter,
            robots,
            articles,
            sources,
            config,
        }
    }

    /// Process all sources with bounded fan-out. A wall-clock budget halts
    /// sources that have not started once it is exceeded.
    pub async fn scrape_all(&self, sources: &[Source]) -> ScrapeReport {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sources));

        let tasks: Vec<_> = sources
            .iter()
            .map(|source| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore open");
                    if started.elapsed() > self.config.max_scrape_time {
                        return SourceOutcome {
                            source_id: source.id,
                            source_url: source.url.clone(),
                            collected: 0,
                            errors: vec![format!(
                                "Scraping timeout: exceeded {}ms",
                                self.config.max_scrape_time.as_millis()
                            )],
                        };
                    }
                    self.scrape_source(source).await
                }
            })
            .collect();

        let mut report = ScrapeReport::default();
        for outcome in join_all(tasks).await {
            report.total_collected += outcome.collected;
            for message in &outcome.errors {
                report.errors.push(ScrapeError {
                    source_url: outcome.source_url.clone(),
                    message: message.clone(),
                });
            }
            report.source_results.push(outcome);
        }
        info!(
            collected = report.total_collected,
            errors = report.errors.len(),
            "scrape stage finished"
        );
        report
    }

    /// Scrape one source. Per-article failures are recorded and skipped so a
    /// bad page never stops the rest of the source.
    pub async fn scrape_source(&self, source: &Source) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            source_id: source.id,
            source_url: source.url.clone(),
            collected: 0,
            errors: Vec::new(),
        };

        if !self.robots.is_allowed(&source.url).await {
            outcome
                .errors
                .push(format!("robots.txt disallows: {}", source.url));
            return outcome;
        }

        let article_urls = match source.kind {
            SourceKind::Single => vec![source.url.clone()],
            SourceKind::List => match self.list_article_urls(source).await {
                Ok(urls) => urls,
                Err(err) => {
                    outcome.errors.push(format!("{}: {}", source.url, err));
                    return outcome;
                }
            },
        };

        // The source row may have been deleted mid-run; degrade to an
        // unowned article instead of failing the upsert.
        let source_id = match self.sources.exists(source.id).await {
            Ok(true) => Some(source.id),
            _ => {
                warn!(source_id = %source.id, "source missing, storing articles without owner");
                None
            }
        };

        let collected_at = Utc::now();
        for url in article_urls {
            match self.fetch_article(&url, source.selector.as_deref()).await {
                Ok((title, content)) => {
                    let upsert = ArticleUpsert {
                        url: url.clone(),
                        title,
                        content,
                        source_id,
                        collected_at,
                    };
                    match self.articles.upsert_by_url(upsert).await {
                        Ok(_) => outcome.collected += 1,
                        Err(err) => outcome.errors.push(format!("{}: {}", url, err)),
                    }
                }
                Err(err) => {
                    warn!(url, error = %err, "article fetch failed");
                    outcome.errors.push(format!("{}: {}", url, err));
                }
            }
        }

        outcome
    }

    async fn list_article_urls(&self, source: &Source) -> Result<Vec<String>> {
        let base = Url::parse(&source.url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", source.url, e)))?;
        let html = self.fetch_page(&source.url).await?;

        let config = source.config.as_ref();
        let mut urls = extract::extract_links(
            &html,
            &base,
            config.and_then(|c| c.list_link_selector.as_deref()),
            config.and_then(|c| c.article_url_pattern.as_deref()),
        );
        if urls.len() > self.config.max_article_urls_per_source {
            info!(
                source = %source.url,
                found = urls.len(),
                max = self.config.max_article_urls_per_source,
                "limiting article urls for source"
            );
            urls.truncate(self.config.max_article_urls_per_source);
        }
        Ok(urls)
    }

    async fn fetch_article(
        &self,
        url: &str,
        content_selector: Option<&str>,
    ) -> Result<(Option<String>, String)> {
        let html = self.fetch_page(url).await?;
        let title = extract::extract_title(&html);
        let raw = extract::extract_content(&html, content_selector);
        Ok((title, extract::sanitize(&raw)))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.limiter.wait(url).await;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .timeout(self.config.fetch_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Scraping(format!("HTTP {}", response.status())));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wd_core::models::SourceConfig;
    use wd_storage::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            rate_limit_interval: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }

    fn list_source(url: &str) -> Source {
        Source {
            id: Uuid::new_v4(),
            url: url.to_string(),
            kind: SourceKind::List,
            selector: None,
            config: Some(SourceConfig {
                list_link_selector: None,
                article_url_pattern: Some("/articles/".to_string()),
            }),
            created_at: Utc::now(),
        }
    }

    async fn mock_article(server: &MockServer, route: &str, title: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<html><head><title>{}</title></head><body><article><p>{}</p></article></body></html>",
                title, body
            )))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_scrape_list_source_collects_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/articles/a">A</a> <a href="/articles/b">B</a> <a href="/about">About</a>"#,
            ))
            .mount(&server)
            .await;
        mock_article(&server, "/articles/a", "Article A", "First body").await;
        mock_article(&server, "/articles/b", "Article B", "Second body").await;

        let store = Arc::new(MemoryStore::new());
        let source = list_source(&format!("{}/news", server.uri()));
        store.insert_source(source.clone()).await;

        let scraper = Scraper::new(store.clone(), store.clone(), fast_config());
        let report = scraper.scrape_all(&[source]).await;

        assert_eq!(report.total_collected, 2);
        assert!(report.errors.is_empty());

        let articles = store.all_articles().await;
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.summary.is_none()));
        assert!(articles
            .iter()
            .any(|a| a.title.as_deref() == Some("Article A")));
    }

    #[tokio::test]
    async fn test_rescrape_resets_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mock_article(&server, "/story", "Story", "Version one").await;

        let store = Arc::new(MemoryStore::new());
        let source = Source {
            id: Uuid::new_v4(),
            url: format!("{}/story", server.uri()),
            kind: SourceKind::Single,
            selector: None,
            config: None,
            created_at: Utc::now(),
        };
        store.insert_source(source.clone()).await;

        let scraper = Scraper::new(store.clone(), store.clone(), fast_config());
        scraper.scrape_all(std::slice::from_ref(&source)).await;

        let article = &store.all_articles().await[0];
        store.set_summary(article.id, "summarized").await.unwrap();

        scraper.scrape_all(&[source]).await;
        let articles = store.all_articles().await;
        assert_eq!(articles.len(), 1);
        assert!(articles[0].summary.is_none());
    }

    #[tokio::test]
    async fn test_robots_disallow_blocks_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let source = Source {
            id: Uuid::new_v4(),
            url: format!("{}/story", server.uri()),
            kind: SourceKind::Single,
            selector: None,
            config: None,
            created_at: Utc::now(),
        };
        store.insert_source(source.clone()).await;

        let scraper = Scraper::new(store.clone(), store.clone(), fast_config());
        let report = scraper.scrape_all(&[source]).await;

        assert_eq!(report.total_collected, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("robots.txt disallows"));
        assert!(store.all_articles().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_article_does_not_stop_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/articles/broken">X</a> <a href="/articles/ok">Y</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mock_article(&server, "/articles/ok", "OK", "Still here").await;

        let store = Arc::new(MemoryStore::new());
        let source = list_source(&format!("{}/news", server.uri()));
        store.insert_source(source.clone()).await;

        let scraper = Scraper::new(store.clone(), store.clone(), fast_config());
        let report = scraper.scrape_all(&[source]).await;

        assert_eq!(report.total_collected, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_list_cap_limits_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/articles/1">1</a> <a href="/articles/2">2</a> <a href="/articles/3">3</a>"#,
            ))
            .mount(&server)
            .await;
        for route in ["/articles/1", "/articles/2", "/articles/3"] {
            mock_article(&server, route, route, "body").await;
        }

        let store = Arc::new(MemoryStore::new());
        let source = list_source(&format!("{}/news", server.uri()));
        store.insert_source(source.clone()).await;

        let config = PipelineConfig {
            max_article_urls_per_source: 2,
            ..fast_config()
        };
        let scraper = Scraper::new(store.clone(), store.clone(), config);
        let report = scraper.scrape_all(&[source]).await;

        assert_eq!(report.total_collected, 2);
        assert_eq!(store.all_articles().await.len(), 2);
    }

    #[tokio::test]
    async fn test_dangling_source_degrades_to_unowned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mock_article(&server, "/story", "Story", "body").await;

        let store = Arc::new(MemoryStore::new());
        // Source is never inserted into the store.
        let source = Source {
            id: Uuid::new_v4(),
            url: format!("{}/story", server.uri()),
            kind: SourceKind::Single,
            selector: None,
            config: None,
            created_at: Utc::now(),
        };

        let scraper = Scraper::new(store.clone(), store.clone(), fast_config());
        let report = scraper.scrape_all(&[source]).await;

        assert_eq!(report.total_collected, 1);
        assert!(store.all_articles().await[0].source_id.is_none());
    }
}
