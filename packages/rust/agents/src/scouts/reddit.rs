//! Reddit scout: newest self-posts of one subreddit via app-only OAuth.

use async_trait::async_trait;
use hunter_shared::{Credentials, FetchFailure, SourceConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BookmarkStrategy, Scout, ScoutReport, decode_each, take_until_bookmark};
use crate::http::{check_status, transport_failure};
use crate::raw::{RawRecord, RedditPost};

const AUTH_BASE: &str = "https://www.reddit.com";
const API_BASE: &str = "https://oauth.reddit.com";
const PAGE_LIMIT: &str = "100";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    #[serde(default)]
    data: serde_json::Value,
}

/// Fetches `/r/{target}/new`, stopping at the stored post id.
pub struct RedditScout {
    client: Client,
    auth_base: String,
    api_base: String,
}

impl RedditScout {
    pub fn new(client: Client) -> Self {
        Self::with_base_urls(client, AUTH_BASE, API_BASE)
    }

    /// Point the scout at other hosts (mock servers in tests).
    pub fn with_base_urls(client: Client, auth_base: &str, api_base: &str) -> Self {
        Self {
            client,
            auth_base: auth_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn access_token(&self, creds: &Credentials) -> Result<String, FetchFailure> {
        let client_id = creds
            .get("client_id")
            .ok_or_else(|| FetchFailure::auth("reddit credentials need client_id"))?;
        let client_secret = creds
            .get("client_secret")
            .ok_or_else(|| FetchFailure::auth("reddit credentials need client_secret"))?;

        let mut request = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")]);
        if let Some(agent) = creds.get("user_agent") {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_failure("reddit token", e))?;
        let token: TokenResponse = check_status("reddit token", response)?
            .json()
            .await
            .map_err(|e| FetchFailure::auth(format!("reddit token: unreadable response: {e}")))?;
        Ok(token.access_token)
    }

    fn listing_url(&self, subreddit: &str) -> Result<Url, FetchFailure> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| FetchFailure::source(format!("bad reddit api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchFailure::source("reddit api base cannot take a path"))?
            .pop_if_empty()
            .extend(["r", subreddit, "new"]);
        url.query_pairs_mut().append_pair("limit", PAGE_LIMIT);
        Ok(url)
    }
}

#[async_trait]
impl Scout for RedditScout {
    #[instrument(skip_all, fields(source = %source.name, subreddit = %source.target))]
    async fn fetch(
        &self,
        source: &SourceConfig,
        credentials: Option<&Credentials>,
    ) -> Result<ScoutReport, FetchFailure> {
        let creds = credentials.ok_or_else(|| FetchFailure::auth("no reddit credentials"))?;
        let subreddit = source.target.trim().trim_start_matches("r/");
        if subreddit.is_empty() {
            return Err(FetchFailure::source("empty subreddit target"));
        }

        let token = self.access_token(creds).await?;
        let url = self.listing_url(subreddit)?;

        let mut request = self.client.get(url).bearer_auth(token);
        if let Some(agent) = creds.get("user_agent") {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }
        let response = request
            .send()
            .await
            .map_err(|e| transport_failure("reddit listing", e))?;
        let listing: Listing = check_status("reddit listing", response)?
            .json()
            .await
            .map_err(|e| FetchFailure::source(format!("reddit listing: unreadable response: {e}")))?;

        let children = listing.data.children.into_iter().map(|c| c.data).collect();
        let posts: Vec<RedditPost> = decode_each(source, children);

        let (fresh, newest) = take_until_bookmark(
            posts,
            source.last_known_item_id.as_deref(),
            |post: &RedditPost| Some(post.id.as_str()).filter(|id| !id.is_empty()),
        );

        let mut records: Vec<RawRecord> = fresh
            .into_iter()
            .filter(|post| {
                let keep = post.is_self && !post.stickied;
                if !keep {
                    debug!(post_id = %post.id, "skipping stickied or link post");
                }
                keep
            })
            .map(RawRecord::Reddit)
            .collect();
        records.reverse();

        debug!(count = records.len(), newest = ?newest, "reddit fetch complete");
        Ok(ScoutReport {
            records,
            newest_bookmark: newest,
        })
    }

    fn bookmark_strategy(&self) -> BookmarkStrategy {
        BookmarkStrategy::OrderedId
    }

    /// Post ids are base-36 counters, so larger means newer.
    fn is_newer_bookmark(&self, previous: &str, candidate: &str) -> bool {
        match (parse_post_id(previous), parse_post_id(candidate)) {
            (Some(prev), Some(cand)) => cand > prev,
            _ => previous != candidate,
        }
    }

    fn name(&self) -> &str {
        "reddit"
    }
}

fn parse_post_id(id: &str) -> Option<u64> {
    let bare = id.strip_prefix("t3_").unwrap_or(id);
    u64::from_str_radix(bare, 36).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouts::test_support::source;
    use hunter_shared::FetchFailureKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials::from([
            ("client_id", "id"),
            ("client_secret", "secret"),
            ("user_agent", "hunter-test/0.1"),
        ])
    }

    fn child(id: &str, is_self: bool, stickied: bool) -> serde_json::Value {
        serde_json::json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": format!("post {id}"),
                "selftext": "something odd happened",
                "permalink": format!("/r/Paranormal/comments/{id}/post/"),
                "created_utc": 1714557600.0,
                "is_self": is_self,
                "stickied": stickied,
            }
        })
    }

    async fn mock_reddit(children: Vec<serde_json::Value>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok", "token_type": "bearer"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/Paranormal/new"))
            .and(query_param("limit", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"children": children}})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn stops_at_bookmark_and_filters_posts() {
        let server = mock_reddit(vec![
            child("1c", true, false),
            child("1b", false, false),
            child("1a", true, true),
            child("19", true, false),
            child("18", true, false),
        ])
        .await;
        let scout = RedditScout::with_base_urls(Client::new(), &server.uri(), &server.uri());

        let report = scout
            .fetch(&source("reddit", "Paranormal", Some("19")), Some(&creds()))
            .await
            .expect("fetch");

        assert_eq!(report.newest_bookmark.as_deref(), Some("1c"));
        let ids: Vec<_> = report
            .records
            .iter()
            .map(|r| match r {
                RawRecord::Reddit(p) => p.id.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["1c"]);
    }

    #[tokio::test]
    async fn returns_oldest_first() {
        let server = mock_reddit(vec![child("b", true, false), child("a", true, false)]).await;
        let scout = RedditScout::with_base_urls(Client::new(), &server.uri(), &server.uri());

        let report = scout
            .fetch(&source("reddit", "r/Paranormal", None), Some(&creds()))
            .await
            .unwrap();
        let ids: Vec<_> = report
            .records
            .iter()
            .filter_map(|r| match r {
                RawRecord::Reddit(p) => Some(p.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(report.newest_bookmark.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn rejected_token_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let scout = RedditScout::with_base_urls(Client::new(), &server.uri(), &server.uri());

        let err = scout
            .fetch(&source("reddit", "Paranormal", None), Some(&creds()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Auth);
    }

    #[tokio::test]
    async fn missing_credentials_is_auth_failure() {
        let scout = RedditScout::new(Client::new());
        let err = scout
            .fetch(&source("reddit", "Paranormal", None), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Auth);
    }

    #[tokio::test]
    async fn rate_limited_listing_is_quota_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/Paranormal/new"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let scout = RedditScout::with_base_urls(Client::new(), &server.uri(), &server.uri());

        let err = scout
            .fetch(&source("reddit", "Paranormal", None), Some(&creds()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Quota);
    }

    #[test]
    fn base36_ordering() {
        let scout = RedditScout::new(Client::new());
        assert!(scout.is_newer_bookmark("1bz", "1c0"));
        assert!(!scout.is_newer_bookmark("1c0", "1bz"));
        assert!(!scout.is_newer_bookmark("t3_1c0", "t3_1c0"));
    }
}
