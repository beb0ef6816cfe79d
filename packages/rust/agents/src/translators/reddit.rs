//! Reddit posts to leads.

use chrono::DateTime;
use hunter_shared::{Lead, LeadMetadata, NewLead, RedditMetadata, SkipReason, SourceConfig};

use super::{Translator, build_lead, date_or_sentinel, required};
use crate::raw::{RawRecord, RedditPost};

const SITE: &str = "https://www.reddit.com";

#[derive(Debug, Default, Clone, Copy)]
pub struct RedditTranslator;

impl Translator for RedditTranslator {
    fn translate_record(
        &self,
        source: &SourceConfig,
        record: RawRecord,
    ) -> Result<Lead, SkipReason> {
        let post = match record {
            RawRecord::Reddit(post) => post,
            other => return Err(SkipReason::UnexpectedRecord(other.kind().to_string())),
        };

        let title = required(post.title.clone(), "title")?;
        let url = required(post_url(&post), "url")?;
        let parsed = post
            .created_utc
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0));
        let raw_date = post.created_utc.map(|secs| secs.to_string());
        let publication_date = date_or_sentinel(source, &url, raw_date.as_deref(), parsed);

        let image_url = post
            .thumbnail
            .clone()
            .filter(|t| t.starts_with("http://") || t.starts_with("https://"));

        build_lead(NewLead {
            title,
            url,
            source_name: source.name.clone(),
            publication_date: Some(publication_date),
            text: post.selftext.clone(),
            html: post.selftext_html.clone(),
            image_url,
            metadata: LeadMetadata::Reddit(RedditMetadata {
                post_id: Some(post.id.clone()).filter(|id| !id.is_empty()),
                subreddit: post.subreddit,
                author: post.author,
                score: post.score,
                upvote_ratio: post.upvote_ratio,
                num_comments: post.num_comments,
                is_self: Some(post.is_self),
                is_original_content: post.is_original_content,
            }),
        })
    }

    fn name(&self) -> &str {
        "reddit"
    }
}

/// Permalink on the public site, falling back to the post's own url.
fn post_url(post: &RedditPost) -> Option<String> {
    match post.permalink.as_deref().map(str::trim) {
        Some(permalink) if !permalink.is_empty() => Some(format!("{SITE}{permalink}")),
        _ => post.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouts::test_support::source;
    use hunter_shared::sentinel_publication_date;

    fn post() -> RedditPost {
        RedditPost {
            id: "1c0".into(),
            title: Some("Shadow in the hallway".into()),
            selftext: Some("It moved when I looked.".into()),
            permalink: Some("/r/Paranormal/comments/1c0/shadow/".into()),
            created_utc: Some(1714557600.0),
            subreddit: Some("Paranormal".into()),
            score: Some(42),
            is_self: true,
            thumbnail: Some("self".into()),
            ..Default::default()
        }
    }

    #[test]
    fn maps_fields_and_metadata() {
        let src = source("reddit", "Paranormal", None);
        let lead = RedditTranslator
            .translate_record(&src, RawRecord::Reddit(post()))
            .unwrap();

        assert_eq!(lead.url(), "https://www.reddit.com/r/Paranormal/comments/1c0/shadow/");
        assert_eq!(lead.source_name(), "reddit test");
        assert_eq!(lead.publication_date().timestamp(), 1714557600);
        assert!(lead.image_url().is_none());
        match lead.metadata() {
            LeadMetadata::Reddit(meta) => {
                assert_eq!(meta.post_id.as_deref(), Some("1c0"));
                assert_eq!(meta.score, Some(42));
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn missing_date_is_sentinel_every_time() {
        let src = source("reddit", "Paranormal", None);
        let undated = RedditPost {
            created_utc: None,
            ..post()
        };
        let a = RedditTranslator
            .translate_record(&src, RawRecord::Reddit(undated.clone()))
            .unwrap();
        let b = RedditTranslator
            .translate_record(&src, RawRecord::Reddit(undated))
            .unwrap();
        assert_eq!(a.publication_date(), sentinel_publication_date());
        assert_eq!(a.publication_date(), b.publication_date());
    }

    #[test]
    fn untitled_post_is_dropped_but_batch_continues() {
        let src = source("reddit", "Paranormal", None);
        let untitled = RedditPost {
            title: None,
            ..post()
        };
        let leads = RedditTranslator.translate(
            &src,
            vec![RawRecord::Reddit(untitled), RawRecord::Reddit(post())],
        );
        assert_eq!(leads.len(), 1);
    }

    #[test]
    fn empty_body_is_invalid_content() {
        let src = source("reddit", "Paranormal", None);
        let empty = RedditPost {
            selftext: Some("".into()),
            selftext_html: None,
            ..post()
        };
        let err = RedditTranslator
            .translate_record(&src, RawRecord::Reddit(empty))
            .unwrap_err();
        assert!(matches!(err, SkipReason::InvalidContent(_)));
    }
}
