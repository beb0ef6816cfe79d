//! Fixture records to leads. Extra fields stay in the generic metadata map.

use hunter_shared::{Lead, LeadMetadata, NewLead, SkipReason, SourceConfig};

use super::{Translator, build_lead, date_or_sentinel, parse_date, required};
use crate::raw::RawRecord;

#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTranslator;

impl Translator for FixtureTranslator {
    fn translate_record(
        &self,
        source: &SourceConfig,
        record: RawRecord,
    ) -> Result<Lead, SkipReason> {
        let fixture = match record {
            RawRecord::Fixture(fixture) => fixture,
            other => return Err(SkipReason::UnexpectedRecord(other.kind().to_string())),
        };

        let title = required(fixture.title, "title")?;
        let url = required(fixture.url, "url")?;
        let raw_date = fixture.publication_date.as_deref();
        let publication_date =
            date_or_sentinel(source, &url, raw_date, parse_date(raw_date));

        build_lead(NewLead {
            title,
            url,
            source_name: source.name.clone(),
            publication_date: Some(publication_date),
            text: fixture.text,
            html: fixture.html,
            image_url: fixture.image_url,
            metadata: LeadMetadata::Generic {
                extras: fixture.metadata.into_iter().collect(),
            },
        })
    }

    fn name(&self) -> &str {
        "test_data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::FixtureRecord;
    use crate::scouts::test_support::source;

    #[test]
    fn keeps_extras_in_generic_metadata() {
        let record: FixtureRecord = serde_json::from_str(
            r#"{"title":"T","url":"https://example.com/t","html":"<p>x</p>",
                "publication_date":"2023-10-31","metadata":{"location":"Salem"}}"#,
        )
        .unwrap();
        let lead = FixtureTranslator
            .translate_record(&source("test_data", "x.json", None), RawRecord::Fixture(record))
            .unwrap();
        assert!(!lead.has_sentinel_date());
        match lead.metadata() {
            LeadMetadata::Generic { extras } => {
                assert_eq!(extras.get("location"), Some(&serde_json::json!("Salem")));
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn missing_url_is_dropped() {
        let record: FixtureRecord = serde_json::from_str(r#"{"title":"T","text":"x"}"#).unwrap();
        let err = FixtureTranslator
            .translate_record(&source("test_data", "x.json", None), RawRecord::Fixture(record))
            .unwrap_err();
        assert_eq!(err, SkipReason::MissingField("url"));
    }
}
