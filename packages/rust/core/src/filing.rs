//! Filing Station: dedup incoming leads and persist them durably.
//!
//! 1. Batch dedup: one query finds urls already routed; those leads are
//!    dropped as duplicates.
//! 2. Per-lead filing: each remaining lead is routed and staged in its own
//!    transaction. A concurrent filer that routed the same url first wins;
//!    its uuid is reused and nothing is staged twice.
//!
//! Duplicates caught by the batch query still count as sightings: their
//! router entries get `last_seen_at` bumped. A lead that fails to file never
//! affects its siblings.

use std::collections::HashMap;

use hunter_shared::{Lead, Result};
use hunter_storage::{RecordOutcome, Storage};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Outcome of filing one batch.
#[derive(Debug, Clone, Default)]
pub struct FilingReport {
    /// Uuids of leads newly routed and staged, in input order.
    pub filed: Vec<Uuid>,
    /// Leads whose url was already routed, with the existing uuid.
    pub duplicates: Vec<(String, Uuid)>,
    /// Leads that could not be persisted, with the error.
    pub failed: Vec<(String, String)>,
}

impl FilingReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.filed.len() + self.duplicates.len() + self.failed.len()
    }
}

/// Files leads into the Triage Ledger through one storage connection.
pub struct FilingStation<'a> {
    storage: &'a Storage,
}

impl<'a> FilingStation<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// File a batch for `source_id`, back-filling each lead's uuid.
    #[instrument(skip_all, fields(source_id = source_id, leads = leads.len()))]
    pub async fn file_leads(&self, source_id: i64, leads: &mut [Lead]) -> FilingReport {
        let mut report = FilingReport::default();
        if leads.is_empty() {
            return report;
        }

        let urls: Vec<&str> = leads.iter().map(Lead::url).collect();
        let existing: HashMap<String, Uuid> = match self.storage.find_existing_urls(&urls).await {
            Ok(found) => found,
            Err(e) => {
                // The per-lead upsert still dedups; only the shortcut is lost.
                warn!(error = %e, "batch dedup query failed, filing lead by lead");
                HashMap::new()
            }
        };

        let mut seen_again = Vec::new();
        for lead in leads.iter_mut() {
            if let Some(uuid) = existing.get(lead.url()) {
                debug!(url = %lead.url(), %uuid, "duplicate lead skipped");
                lead.assign_uuid(*uuid);
                report.duplicates.push((lead.url().to_string(), *uuid));
                seen_again.push(*uuid);
                continue;
            }

            match self.file_lead(source_id, lead).await {
                Ok(RecordOutcome::Created(uuid)) => report.filed.push(uuid),
                Ok(RecordOutcome::Existing(uuid)) => {
                    debug!(url = %lead.url(), %uuid, "lead routed by another filer, skipped");
                    report.duplicates.push((lead.url().to_string(), uuid));
                }
                Err(e) => {
                    error!(url = %lead.url(), error = %e, "failed to file lead");
                    report.failed.push((lead.url().to_string(), e.to_string()));
                }
            }
        }

        if !seen_again.is_empty() {
            // A missed bump only ages last_seen_at; the batch itself is fine.
            if let Err(e) = self.storage.touch_router_entries(&seen_again).await {
                warn!(error = %e, count = seen_again.len(), "failed to record later sightings");
            }
        }

        debug!(
            filed = report.filed.len(),
            duplicates = report.duplicates.len(),
            failed = report.failed.len(),
            "filing complete"
        );
        report
    }

    /// File a single lead. Filing the same url again returns the same uuid.
    pub async fn file_lead(&self, source_id: i64, lead: &mut Lead) -> Result<RecordOutcome> {
        let outcome = self.storage.record_lead(source_id, lead).await?;
        lead.assign_uuid(outcome.uuid());
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use hunter_shared::{Lead, NewLead, NewSource};
    use hunter_storage::Storage;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    pub async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("hunter_core_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    pub async fn add_source(
        storage: &Storage,
        domain: &str,
        name: &str,
        agent_type: &str,
        target: &str,
    ) -> i64 {
        let domain_id = storage.add_domain(domain).await.unwrap();
        storage
            .add_source(&NewSource {
                name: name.into(),
                agent_type: agent_type.into(),
                target: target.into(),
                domain_id,
                purpose: hunter_shared::DEFAULT_PURPOSE.into(),
                is_active: true,
            })
            .await
            .unwrap()
    }

    pub fn lead(url: &str, title: &str) -> Lead {
        Lead::new(NewLead {
            title: title.into(),
            url: url.into(),
            source_name: "Test Source".into(),
            text: Some(format!("{title} body")),
            ..Default::default()
        })
        .unwrap()
    }
}
