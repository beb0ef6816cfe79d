//! Translator trait and built-in translators.
//!
//! Translators are pure: raw records in, canonical leads out. A record that
//! cannot become a lead is dropped with a logged [`SkipReason`]; the rest of
//! the batch carries on.

mod fixture;
mod gnews;
mod reddit;

use chrono::{DateTime, Utc};
use hunter_shared::{Lead, NewLead, SkipReason, SourceConfig, sentinel_publication_date};
use tracing::warn;

use crate::raw::RawRecord;

pub use fixture::FixtureTranslator;
pub use gnews::GNewsTranslator;
pub use reddit::RedditTranslator;

/// Per-source-type normalizer.
pub trait Translator: Send + Sync {
    /// Map one raw record to a lead.
    fn translate_record(&self, source: &SourceConfig, record: RawRecord)
    -> Result<Lead, SkipReason>;

    /// Map a batch, dropping (and logging) records that cannot be translated.
    fn translate(&self, source: &SourceConfig, records: Vec<RawRecord>) -> Vec<Lead> {
        let total = records.len();
        let leads: Vec<Lead> = records
            .into_iter()
            .filter_map(|record| match self.translate_record(source, record) {
                Ok(lead) => Some(lead),
                Err(reason) => {
                    warn!(source = %source.name, %reason, "translation skipped record");
                    None
                }
            })
            .collect();
        if leads.len() < total {
            tracing::debug!(
                source = %source.name,
                total,
                kept = leads.len(),
                "translated batch with skips"
            );
        }
        leads
    }

    /// Human-readable translator name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A required string field, trimmed.
pub(crate) fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, SkipReason> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(SkipReason::MissingField(field))
}

/// Use the parsed date, or log and fall back to the sentinel.
pub(crate) fn date_or_sentinel(
    source: &SourceConfig,
    url: &str,
    raw: Option<&str>,
    parsed: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match parsed {
        Some(date) => date,
        None => {
            warn!(
                source = %source.name,
                %url,
                raw = raw.unwrap_or("<missing>"),
                "publication date missing or unparsable, using sentinel"
            );
            sentinel_publication_date()
        }
    }
}

/// RFC 3339 timestamps, or bare `YYYY-MM-DD` dates at midnight UTC.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Build the lead, reporting invariant violations as a skip.
pub(crate) fn build_lead(new: NewLead) -> Result<Lead, SkipReason> {
    Lead::new(new).map_err(|e| SkipReason::InvalidContent(e.to_string()))
}
