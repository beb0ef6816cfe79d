//! GNews articles to leads.

use std::sync::LazyLock;

use hunter_shared::{GNewsMetadata, Lead, LeadMetadata, NewLead, SkipReason, SourceConfig};
use regex::Regex;

use super::{Translator, build_lead, date_or_sentinel, parse_date, required};
use crate::raw::RawRecord;

#[derive(Debug, Default, Clone, Copy)]
pub struct GNewsTranslator;

impl Translator for GNewsTranslator {
    fn translate_record(
        &self,
        source: &SourceConfig,
        record: RawRecord,
    ) -> Result<Lead, SkipReason> {
        let article = match record {
            RawRecord::GNews(article) => article,
            other => return Err(SkipReason::UnexpectedRecord(other.kind().to_string())),
        };

        let title = required(article.title, "title")?;
        let url = required(article.url, "url")?;
        let raw_date = article.published_at.as_deref();
        let publication_date =
            date_or_sentinel(source, &url, raw_date, parse_date(raw_date));

        // The free tier truncates `content`; the description is the fallback body.
        let text = article
            .content
            .map(|c| strip_truncation_marker(&c))
            .filter(|c| !c.is_empty())
            .or_else(|| article.description.clone());
        let outlet = article.source.unwrap_or_default();

        build_lead(NewLead {
            title,
            url,
            source_name: source.name.clone(),
            publication_date: Some(publication_date),
            text,
            html: None,
            image_url: article.image,
            metadata: LeadMetadata::GNews(GNewsMetadata {
                outlet_name: outlet.name,
                outlet_url: outlet.url,
                description: article.description,
            }),
        })
    }

    fn name(&self) -> &str {
        "gnews_io"
    }
}

/// Drop the `... [1234 chars]` suffix the API appends to cut-off content.
fn strip_truncation_marker(content: &str) -> String {
    static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\s*(?:\.\.\.|…)?\s*\[\+?\d+ chars\]\s*$").expect("valid regex")
    });
    MARKER_RE.replace(content, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{GNewsArticle, GNewsOutlet};
    use crate::scouts::test_support::source;
    use hunter_shared::sentinel_publication_date;

    fn article() -> GNewsArticle {
        GNewsArticle {
            title: Some("Lights reported over lake".into()),
            description: Some("Residents saw lights.".into()),
            content: Some("Several residents reported...".into()),
            url: Some("https://news.example/lights".into()),
            image: Some("https://news.example/lights.jpg".into()),
            published_at: Some("2024-05-01T10:00:00Z".into()),
            source: Some(GNewsOutlet {
                name: Some("Daily Example".into()),
                url: Some("https://news.example".into()),
            }),
        }
    }

    #[test]
    fn maps_outlet_into_metadata() {
        let src = source("gnews_io", "lights", None);
        let lead = GNewsTranslator
            .translate_record(&src, RawRecord::GNews(article()))
            .unwrap();
        assert_eq!(lead.image_url(), Some("https://news.example/lights.jpg"));
        match lead.metadata() {
            LeadMetadata::GNews(meta) => {
                assert_eq!(meta.outlet_name.as_deref(), Some("Daily Example"));
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn garbled_date_becomes_sentinel() {
        let src = source("gnews_io", "lights", None);
        let garbled = GNewsArticle {
            published_at: Some("last tuesday".into()),
            ..article()
        };
        let lead = GNewsTranslator
            .translate_record(&src, RawRecord::GNews(garbled))
            .unwrap();
        assert!(lead.has_sentinel_date());
        assert_eq!(lead.publication_date(), sentinel_publication_date());
    }

    #[test]
    fn description_backs_up_missing_content() {
        let src = source("gnews_io", "lights", None);
        let bare = GNewsArticle {
            content: None,
            ..article()
        };
        let lead = GNewsTranslator
            .translate_record(&src, RawRecord::GNews(bare))
            .unwrap();
        assert_eq!(lead.text(), Some("Residents saw lights."));
    }

    #[test]
    fn truncation_marker_is_stripped() {
        let src = source("gnews_io", "lights", None);
        let cut = GNewsArticle {
            content: Some("Several residents reported lights... [1532 chars]".into()),
            ..article()
        };
        let lead = GNewsTranslator
            .translate_record(&src, RawRecord::GNews(cut))
            .unwrap();
        assert_eq!(lead.text(), Some("Several residents reported lights"));

        assert_eq!(strip_truncation_marker("  [12 chars]"), "");
        assert_eq!(strip_truncation_marker("no marker here"), "no marker here");
    }

    #[test]
    fn wrong_record_kind_is_skipped() {
        let src = source("gnews_io", "lights", None);
        let err = GNewsTranslator
            .translate_record(&src, RawRecord::Fixture(Default::default()))
            .unwrap_err();
        assert_eq!(err, SkipReason::UnexpectedRecord("test_data".into()));
    }
}
