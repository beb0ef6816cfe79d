//! `test_data` scout: reads a JSON array of records from a local file.
//!
//! Records are listed newest first. Those carrying an `id` are bookmarked
//! like an ordered feed; numeric ids compare numerically.

use async_trait::async_trait;
use hunter_shared::{Credentials, FetchFailure, SourceConfig};
use tracing::{debug, instrument};

use super::{BookmarkStrategy, Scout, ScoutReport, decode_each, take_until_bookmark};
use crate::raw::{FixtureRecord, RawRecord};

#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureScout;

#[async_trait]
impl Scout for FixtureScout {
    #[instrument(skip_all, fields(source = %source.name, path = %source.target))]
    async fn fetch(
        &self,
        source: &SourceConfig,
        _credentials: Option<&Credentials>,
    ) -> Result<ScoutReport, FetchFailure> {
        let content = tokio::fs::read_to_string(&source.target)
            .await
            .map_err(|e| FetchFailure::source(format!("cannot read {}: {e}", source.target)))?;
        let items: Vec<serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| FetchFailure::source(format!("{} is not a JSON array: {e}", source.target)))?;

        let records: Vec<FixtureRecord> = decode_each(source, items);
        let (mut fresh, newest) = take_until_bookmark(
            records,
            source.last_known_item_id.as_deref(),
            |record: &FixtureRecord| record.id.as_deref(),
        );
        fresh.reverse();

        debug!(count = fresh.len(), "fixture fetch complete");
        Ok(ScoutReport {
            records: fresh.into_iter().map(RawRecord::Fixture).collect(),
            newest_bookmark: newest,
        })
    }

    fn bookmark_strategy(&self) -> BookmarkStrategy {
        BookmarkStrategy::OrderedId
    }

    fn is_newer_bookmark(&self, previous: &str, candidate: &str) -> bool {
        match (previous.parse::<u64>(), candidate.parse::<u64>()) {
            (Ok(prev), Ok(cand)) => cand > prev,
            _ => previous != candidate,
        }
    }

    fn name(&self) -> &str {
        "test_data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouts::test_support::source;
    use hunter_shared::FetchFailureKind;

    fn write_fixture(body: &str) -> String {
        let path = std::env::temp_dir().join(format!("hunter_fixture_{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn reads_records_and_skips_malformed() {
        let path = write_fixture(
            r#"[
                {"id": 3, "title": "Three", "url": "https://example.com/3", "text": "c"},
                "not an object",
                {"id": 2, "title": "Two", "url": "https://example.com/2", "text": "b"},
                {"id": 1, "title": "One", "url": "https://example.com/1", "text": "a"}
            ]"#,
        );
        let report = FixtureScout
            .fetch(&source("test_data", &path, Some("1")), None)
            .await
            .unwrap();

        assert_eq!(report.newest_bookmark.as_deref(), Some("3"));
        let ids: Vec<_> = report
            .records
            .iter()
            .filter_map(|r| match r {
                RawRecord::Fixture(f) => f.id.as_deref(),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn missing_file_is_source_failure() {
        let err = FixtureScout
            .fetch(&source("test_data", "/nonexistent/hunter.json", None), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Source);
    }

    #[test]
    fn numeric_ids_compare_numerically() {
        assert!(FixtureScout.is_newer_bookmark("9", "10"));
        assert!(!FixtureScout.is_newer_bookmark("10", "9"));
    }
}
