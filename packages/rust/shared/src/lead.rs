//! The canonical [`Lead`] and its typed per-source metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HunterError, Result};

/// Publication date assigned when a source omits or garbles the real one.
///
/// Fixed so that re-translating the same record is idempotent and so that
/// sentinel-dated leads are easy to find later.
pub fn sentinel_publication_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Reddit-specific fields carried alongside a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedditMetadata {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub is_self: Option<bool>,
    #[serde(default)]
    pub is_original_content: Option<bool>,
}

/// GNews.io-specific fields: the outlet that published the article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GNewsMetadata {
    #[serde(default)]
    pub outlet_name: Option<String>,
    #[serde(default)]
    pub outlet_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Source-specific extension of a lead.
///
/// One variant per modelled source type; anything else lands in `Generic`.
/// Serialized with an internal `kind` tag so a stored payload can be
/// rehydrated into the right variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeadMetadata {
    Reddit(RedditMetadata),
    #[serde(rename = "gnews_io")]
    GNews(GNewsMetadata),
    Generic {
        #[serde(default)]
        extras: BTreeMap<String, serde_json::Value>,
    },
}

impl Default for LeadMetadata {
    fn default() -> Self {
        Self::Generic {
            extras: BTreeMap::new(),
        }
    }
}

impl LeadMetadata {
    /// Short tag naming the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reddit(_) => "reddit",
            Self::GNews(_) => "gnews_io",
            Self::Generic { .. } => "generic",
        }
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| HunterError::parse(e.to_string()))
    }

    /// Rebuild metadata from a stored payload.
    ///
    /// Tagged payloads map back to their variant. Untagged or unrecognised
    /// payloads (older rows, hand-edited data) keep their keys in the generic
    /// map so nothing is lost.
    pub fn rehydrate(source_name: &str, stored: Option<&str>) -> Self {
        let Some(raw) = stored.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };

        if let Ok(meta) = serde_json::from_str::<LeadMetadata>(raw) {
            return meta;
        }

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => {
                tracing::debug!(source = source_name, "untyped metadata, keeping generic map");
                Self::Generic {
                    extras: map.into_iter().collect(),
                }
            }
            Ok(other) => {
                let mut extras = BTreeMap::new();
                extras.insert("value".to_string(), other);
                Self::Generic { extras }
            }
            Err(e) => {
                tracing::warn!(source = source_name, error = %e, "unreadable metadata dropped");
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// Input for [`Lead::new`]. Plain data; validation happens on construction.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub image_url: Option<String>,
    pub metadata: LeadMetadata,
}

/// A normalized unit of acquired content awaiting triage.
///
/// Invariants: `title`, `url` and `source_name` are non-blank, and at least one
/// of `text`/`html` is non-blank. Only `lead_uuid` changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    title: String,
    url: String,
    source_name: String,
    publication_date: DateTime<Utc>,
    text: Option<String>,
    html: Option<String>,
    image_url: Option<String>,
    metadata: LeadMetadata,
    lead_uuid: Option<Uuid>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Lead {
    /// Validate and build a lead. A missing publication date becomes the sentinel.
    pub fn new(new: NewLead) -> Result<Self> {
        if new.title.trim().is_empty() {
            return Err(HunterError::validation("lead title cannot be empty"));
        }
        if new.url.trim().is_empty() {
            return Err(HunterError::validation("lead url cannot be empty"));
        }
        if new.source_name.trim().is_empty() {
            return Err(HunterError::validation("lead source_name cannot be empty"));
        }

        let text = non_blank(new.text);
        let html = non_blank(new.html);
        if text.is_none() && html.is_none() {
            return Err(HunterError::validation(
                "lead must have either text or html content",
            ));
        }

        Ok(Self {
            title: new.title.trim().to_string(),
            url: new.url.trim().to_string(),
            source_name: new.source_name,
            publication_date: new
                .publication_date
                .unwrap_or_else(sentinel_publication_date),
            text,
            html,
            image_url: non_blank(new.image_url),
            metadata: new.metadata,
            lead_uuid: None,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Dedup key. Compared by exact match.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn publication_date(&self) -> DateTime<Utc> {
        self.publication_date
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn metadata(&self) -> &LeadMetadata {
        &self.metadata
    }

    pub fn lead_uuid(&self) -> Option<Uuid> {
        self.lead_uuid
    }

    /// Whether the publication date is the sentinel rather than a real date.
    pub fn has_sentinel_date(&self) -> bool {
        self.publication_date == sentinel_publication_date()
    }

    /// Back-fill the identifier assigned at filing time.
    pub fn assign_uuid(&mut self, uuid: Uuid) {
        self.lead_uuid = Some(uuid);
    }

    /// Consuming variant of [`Lead::assign_uuid`], used when rehydrating rows.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.lead_uuid = Some(uuid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: Option<&str>, html: Option<&str>) -> NewLead {
        NewLead {
            title: "Lights over the lake".into(),
            url: "https://example.com/lights".into(),
            source_name: "Test Source".into(),
            publication_date: None,
            text: text.map(String::from),
            html: html.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn content_rule_rejects_only_empty_empty() {
        assert!(Lead::new(draft(None, None)).is_err());
        assert!(Lead::new(draft(Some(""), Some(""))).is_err());
        assert!(Lead::new(draft(Some("   "), None)).is_err());

        assert!(Lead::new(draft(Some("body"), None)).is_ok());
        assert!(Lead::new(draft(None, Some("<p>body</p>"))).is_ok());
        assert!(Lead::new(draft(Some("body"), Some("<p>body</p>"))).is_ok());
        assert!(Lead::new(draft(Some(""), Some("<p>body</p>"))).is_ok());
    }

    #[test]
    fn required_strings_are_checked() {
        let mut d = draft(Some("body"), None);
        d.title = "  ".into();
        assert!(Lead::new(d).is_err());

        let mut d = draft(Some("body"), None);
        d.url = String::new();
        assert!(Lead::new(d).is_err());

        let mut d = draft(Some("body"), None);
        d.source_name = String::new();
        assert!(Lead::new(d).is_err());
    }

    #[test]
    fn missing_date_becomes_fixed_sentinel() {
        let a = Lead::new(draft(Some("body"), None)).unwrap();
        let b = Lead::new(draft(Some("body"), None)).unwrap();
        assert_eq!(a.publication_date(), b.publication_date());
        assert_eq!(a.publication_date().to_rfc3339(), "1900-01-01T00:00:00+00:00");
        assert!(a.has_sentinel_date());
    }

    #[test]
    fn uuid_is_back_filled() {
        let mut lead = Lead::new(draft(Some("body"), None)).unwrap();
        assert!(lead.lead_uuid().is_none());
        let id = Uuid::now_v7();
        lead.assign_uuid(id);
        assert_eq!(lead.lead_uuid(), Some(id));
    }

    #[test]
    fn metadata_rehydrates_by_tag() {
        let meta = LeadMetadata::Reddit(RedditMetadata {
            post_id: Some("abc".into()),
            score: Some(42),
            ..Default::default()
        });
        let json = meta.to_json().unwrap();
        assert!(json.contains(r#""kind":"reddit""#));
        assert_eq!(LeadMetadata::rehydrate("Reddit Ghosts", Some(&json)), meta);

        let gnews = LeadMetadata::GNews(GNewsMetadata {
            outlet_name: Some("Daily Planet".into()),
            ..Default::default()
        });
        let json = gnews.to_json().unwrap();
        assert_eq!(LeadMetadata::rehydrate("GNews.io", Some(&json)), gnews);
    }

    #[test]
    fn untagged_metadata_falls_back_to_generic() {
        let meta = LeadMetadata::rehydrate("Legacy", Some(r#"{"score": 3, "flair": "sighting"}"#));
        match meta {
            LeadMetadata::Generic { extras } => {
                assert_eq!(extras.get("flair").and_then(|v| v.as_str()), Some("sighting"));
            }
            other => panic!("expected generic, got {other:?}"),
        }

        assert_eq!(LeadMetadata::rehydrate("Legacy", None), LeadMetadata::default());
        assert_eq!(LeadMetadata::rehydrate("Legacy", Some("not json")), LeadMetadata::default());
    }
}
