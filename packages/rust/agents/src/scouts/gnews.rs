//! GNews.io scout: keyword search, bookmarked by last successful run.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use hunter_shared::{Credentials, FetchFailure, SourceConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{BookmarkStrategy, Scout, ScoutReport, decode_each};
use crate::http::{check_status, transport_failure};
use crate::raw::{GNewsArticle, RawRecord};

const API_BASE: &str = "https://gnews.io";

/// Overlap with the previous window so late-indexed articles are not missed.
/// Duplicates from the overlap are dropped by url at filing.
const LOOKBACK_BUFFER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<serde_json::Value>,
}

/// Searches `/api/v4/search` for the source's target query.
pub struct GNewsScout {
    client: Client,
    api_base: String,
}

impl GNewsScout {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, API_BASE)
    }

    pub fn with_base_url(client: Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Lower bound for the search window.
    ///
    /// Anchored on the last success so an outage longer than the buffer
    /// cannot skip articles; `last_checked_at` is only used for sources
    /// that have never succeeded.
    fn window_start(source: &SourceConfig) -> Option<String> {
        let buffer = chrono::Duration::from_std(LOOKBACK_BUFFER).ok()?;
        source
            .last_success_at
            .or(source.last_checked_at)
            .map(|anchor| (anchor - buffer).to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

#[async_trait]
impl Scout for GNewsScout {
    #[instrument(skip_all, fields(source = %source.name, query = %source.target))]
    async fn fetch(
        &self,
        source: &SourceConfig,
        credentials: Option<&Credentials>,
    ) -> Result<ScoutReport, FetchFailure> {
        let api_key = credentials
            .and_then(|c| c.get("api_key"))
            .ok_or_else(|| FetchFailure::auth("gnews credentials need api_key"))?;
        if source.target.trim().is_empty() {
            return Err(FetchFailure::source("empty search query"));
        }

        let mut query = vec![
            ("q", source.target.trim().to_string()),
            ("token", api_key.to_string()),
            ("lang", "en".to_string()),
            ("country", "us".to_string()),
            ("max", "10".to_string()),
            ("sortby", "publishedAt".to_string()),
        ];
        if let Some(from) = Self::window_start(source) {
            debug!(%from, "searching from last success minus buffer");
            query.push(("from", from));
        }

        let response = self
            .client
            .get(format!("{}/api/v4/search", self.api_base))
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_failure("gnews search", e))?;
        let body: SearchResponse = check_status("gnews search", response)?
            .json()
            .await
            .map_err(|e| FetchFailure::source(format!("gnews search: unreadable response: {e}")))?;

        let mut articles: Vec<GNewsArticle> = decode_each(source, body.articles);
        // sortby=publishedAt returns newest first.
        articles.reverse();

        debug!(count = articles.len(), "gnews fetch complete");
        Ok(ScoutReport {
            records: articles.into_iter().map(RawRecord::GNews).collect(),
            newest_bookmark: None,
        })
    }

    fn bookmark_strategy(&self) -> BookmarkStrategy {
        BookmarkStrategy::SuccessTimestamp {
            buffer: LOOKBACK_BUFFER,
        }
    }

    fn name(&self) -> &str {
        "gnews_io"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouts::test_support::source;
    use chrono::TimeZone;
    use hunter_shared::FetchFailureKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials::from([("api_key", "k")])
    }

    #[tokio::test]
    async fn searches_from_first_check_when_never_successful() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/search"))
            .and(query_param("q", "ghost sighting"))
            .and(query_param("token", "k"))
            .and(query_param("from", "2024-05-01T09:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalArticles": 2,
                "articles": [
                    {"title": "Newer", "url": "https://news.example/2", "content": "b",
                     "publishedAt": "2024-05-01T11:00:00Z"},
                    {"title": "Older", "url": "https://news.example/1", "content": "a",
                     "publishedAt": "2024-05-01T10:30:00Z"}
                ]
            })))
            .mount(&server)
            .await;

        let mut src = source("gnews_io", "ghost sighting", None);
        src.last_checked_at = Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        let scout = GNewsScout::with_base_url(Client::new(), &server.uri());
        let report = scout.fetch(&src, Some(&creds())).await.expect("fetch");

        assert!(report.newest_bookmark.is_none());
        let titles: Vec<_> = report
            .records
            .iter()
            .filter_map(|r| match r {
                RawRecord::GNews(a) => a.title.as_deref(),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["Older", "Newer"]);
    }

    #[tokio::test]
    async fn failed_runs_do_not_move_the_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/search"))
            .and(query_param("from", "2024-05-01T09:00:00Z"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"totalArticles": 0, "articles": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        // Succeeded at 10:00, then failed through 15:00.
        let mut src = source("gnews_io", "outage", None);
        src.last_success_at = Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        src.last_failure_at = Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap());
        src.last_checked_at = src.last_failure_at;
        src.consecutive_failures = 5;

        let scout = GNewsScout::with_base_url(Client::new(), &server.uri());
        scout.fetch(&src, Some(&creds())).await.expect("fetch");
        assert_eq!(
            GNewsScout::window_start(&src).as_deref(),
            Some("2024-05-01T09:00:00Z")
        );
    }

    #[tokio::test]
    async fn missing_api_key_is_auth_failure() {
        let scout = GNewsScout::new(Client::new());
        let err = scout
            .fetch(&source("gnews_io", "ufo", None), Some(&Credentials::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Auth);
    }

    #[tokio::test]
    async fn forbidden_is_auth_and_server_error_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let scout = GNewsScout::with_base_url(Client::new(), &server.uri());

        let err = scout
            .fetch(&source("gnews_io", "forbidden", None), Some(&creds()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Auth);

        let err = scout
            .fetch(&source("gnews_io", "broken", None), Some(&creds()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Network);
    }

    #[tokio::test]
    async fn empty_result_is_not_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"totalArticles": 0, "articles": []})),
            )
            .mount(&server)
            .await;
        let scout = GNewsScout::with_base_url(Client::new(), &server.uri());
        let report = scout
            .fetch(&source("gnews_io", "quiet", None), Some(&creds()))
            .await
            .unwrap();
        assert!(report.records.is_empty());
    }
}
