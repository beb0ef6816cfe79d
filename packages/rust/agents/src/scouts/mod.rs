//! Scout trait and built-in scouts.
//!
//! A scout fetches raw records for one source. It never touches the
//! database: everything it needs arrives in the [`SourceConfig`] and the
//! credential bag, and everything it learns leaves in a [`ScoutReport`].

mod fixture;
mod gnews;
mod reddit;

use std::time::Duration;

use async_trait::async_trait;
use hunter_shared::{Credentials, FetchFailure, SourceConfig};

use crate::raw::RawRecord;

pub use fixture::FixtureScout;
pub use gnews::GNewsScout;
pub use reddit::RedditScout;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Output of one successful fetch.
#[derive(Debug, Clone, Default)]
pub struct ScoutReport {
    /// New records, oldest first. Empty means "nothing new", not failure.
    pub records: Vec<RawRecord>,
    /// Newest item id seen this run, for ordered-id sources.
    pub newest_bookmark: Option<String>,
}

impl ScoutReport {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// How a source type remembers where it left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkStrategy {
    /// Items have ordered ids; the scout stops at the stored one.
    OrderedId,
    /// No usable ids; query from the last successful run minus a safety
    /// buffer. Failed runs do not move the window.
    SuccessTimestamp { buffer: Duration },
}

/// Per-source-type raw fetcher.
#[async_trait]
pub trait Scout: Send + Sync {
    /// Fetch records newer than the source's bookmark.
    async fn fetch(
        &self,
        source: &SourceConfig,
        credentials: Option<&Credentials>,
    ) -> Result<ScoutReport, FetchFailure>;

    fn bookmark_strategy(&self) -> BookmarkStrategy;

    /// Whether `candidate` may replace the stored `previous` bookmark.
    fn is_newer_bookmark(&self, previous: &str, candidate: &str) -> bool {
        previous != candidate
    }

    /// Human-readable scout name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep items newer than `bookmark` from a newest-first list.
///
/// Returns the kept items (still newest first) and the id of the first item,
/// which becomes the next bookmark. Items without an id are kept but never
/// match or become the bookmark.
pub fn take_until_bookmark<T>(
    newest_first: Vec<T>,
    bookmark: Option<&str>,
    id_of: impl Fn(&T) -> Option<&str>,
) -> (Vec<T>, Option<String>) {
    let newest = newest_first
        .iter()
        .find_map(|item| id_of(item).map(str::to_string));

    let mut kept = Vec::with_capacity(newest_first.len());
    for item in newest_first {
        if bookmark.is_some() && id_of(&item) == bookmark {
            break;
        }
        kept.push(item);
    }
    (kept, newest)
}

/// Decode a JSON array element by element, logging and skipping bad ones.
pub(crate) fn decode_each<T: serde::de::DeserializeOwned>(
    source: &SourceConfig,
    items: Vec<serde_json::Value>,
) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(source = %source.name, index, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use hunter_shared::SourceConfig;

    pub fn source(agent_type: &str, target: &str, bookmark: Option<&str>) -> SourceConfig {
        SourceConfig {
            id: 1,
            name: format!("{agent_type} test"),
            agent_type: agent_type.into(),
            target: target.into(),
            domain_id: 1,
            domain_name: "Test".into(),
            purpose: hunter_shared::DEFAULT_PURPOSE.into(),
            is_active: true,
            consecutive_failures: 0,
            last_checked_at: None,
            last_success_at: None,
            last_failure_at: None,
            last_known_item_id: bookmark.map(String::from),
        }
    }
}
