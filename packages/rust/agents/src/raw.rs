//! Raw records as scouts receive them.
//!
//! These mirror upstream payloads loosely: almost every field is optional so
//! that one odd record can be skipped by its translator instead of failing
//! the whole batch at decode time.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One record fetched by a scout. Never persisted.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Reddit(RedditPost),
    GNews(GNewsArticle),
    Fixture(FixtureRecord),
}

impl RawRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reddit(_) => "reddit",
            Self::GNews(_) => "gnews_io",
            Self::Fixture(_) => "test_data",
        }
    }
}

/// The `data` object of a Reddit `t3` listing child.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPost {
    pub id: String,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub selftext_html: Option<String>,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub created_utc: Option<f64>,
    pub author: Option<String>,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub upvote_ratio: Option<f64>,
    pub num_comments: Option<i64>,
    pub is_self: bool,
    pub stickied: bool,
    pub is_original_content: Option<bool>,
    pub thumbnail: Option<String>,
}

/// One entry of a GNews `articles` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GNewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    pub source: Option<GNewsOutlet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GNewsOutlet {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// A record from a local JSON fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixtureRecord {
    /// Ordered id; records without one never move the bookmark.
    #[serde(deserialize_with = "id_as_string")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub image_url: Option<String>,
    pub publication_date: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Fixture ids may be written as numbers or strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
