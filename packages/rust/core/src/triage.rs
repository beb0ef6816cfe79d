//! Triage service: apply human decisions to staged leads.
//!
//! Decisions are checked against the lead's current status before anything
//! is touched. When a training export directory is configured, the staged
//! text of a promoted or ignored lead is written out first; a failed export
//! leaves the lead exactly as it was.

use std::path::{Path, PathBuf};

use hunter_shared::{
    Case, HunterError, LeadStatus, Result, StagedLead, TriageDecision,
};
use hunter_storage::Storage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const CASE_DIR: &str = "case";
const NOT_A_CASE_DIR: &str = "not_a_case";
const MAX_SLUG_LEN: usize = 80;

/// What a decision did to the lead.
#[derive(Debug, Clone, PartialEq)]
pub enum TriageOutcome {
    Promoted(Case),
    Ignored,
    /// Now (or still) under review.
    Triaged,
}

impl TriageOutcome {
    pub fn status(&self) -> LeadStatus {
        match self {
            Self::Promoted(_) => LeadStatus::Promoted,
            Self::Ignored => LeadStatus::Ignored,
            Self::Triaged => LeadStatus::Triaged,
        }
    }
}

/// Applies triage decisions against the ledger.
pub struct TriageService<'a> {
    storage: &'a Storage,
    export_dir: Option<PathBuf>,
}

impl<'a> TriageService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            export_dir: None,
        }
    }

    /// Export the staged text of decided leads under `dir`.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Staged leads awaiting a decision, optionally filtered by status.
    pub async fn list_staged_leads(&self, status: Option<LeadStatus>) -> Result<Vec<StagedLead>> {
        self.storage.list_staged_leads(status).await
    }

    #[instrument(skip_all, fields(%lead_uuid, ?decision))]
    pub async fn apply_triage_decision(
        &self,
        lead_uuid: Uuid,
        decision: TriageDecision,
    ) -> Result<TriageOutcome> {
        let entry = self
            .storage
            .get_router_entry(lead_uuid)
            .await?
            .ok_or_else(|| HunterError::NotFound(format!("lead {lead_uuid}")))?;

        let Some(next) = entry.status.after(decision) else {
            return Err(HunterError::invalid_transition(lead_uuid, entry.status, decision));
        };
        debug!(from = %entry.status, to = %next, "applying triage decision");

        match decision {
            TriageDecision::Promote => {
                self.export(lead_uuid, CASE_DIR).await?;
                let case = self.storage.promote_lead(lead_uuid).await?;
                Ok(TriageOutcome::Promoted(case))
            }
            TriageDecision::Ignore => {
                self.export(lead_uuid, NOT_A_CASE_DIR).await?;
                self.storage.ignore_lead(lead_uuid).await?;
                Ok(TriageOutcome::Ignored)
            }
            TriageDecision::Skip => {
                self.storage.mark_triaged(lead_uuid).await?;
                Ok(TriageOutcome::Triaged)
            }
        }
    }

    /// Write the staged text to `<export_dir>/<label>/`, if exporting.
    async fn export(&self, lead_uuid: Uuid, label: &str) -> Result<Option<PathBuf>> {
        let Some(root) = &self.export_dir else {
            return Ok(None);
        };
        let staged = self
            .storage
            .get_staged_lead(lead_uuid)
            .await?
            .ok_or_else(|| HunterError::NotFound(format!("staging record for lead {lead_uuid}")))?;

        let dir = root.join(label);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HunterError::io(&dir, e))?;

        let path = dir.join(export_file_name(staged.lead.title(), staged.lead.url()));
        write_atomic(&path, staged.lead.text().unwrap_or_default()).await?;
        info!(path = %path.display(), "exported lead for training");
        Ok(Some(path))
    }
}

/// `<slug>-<hash8>.txt`; the hash keeps same-titled leads apart.
fn export_file_name(title: &str, url: &str) -> String {
    let mut slug = slugify(title);
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("lead");
    }

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{slug}-{}.txt", &hash[..8])
}

/// Lowercase ASCII slug with single dashes between words.
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp = path.with_extension("txt.tmp");
    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| HunterError::io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| HunterError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::FilingStation;
    use crate::filing::test_support::{add_source, lead, test_storage};

    async fn staged(storage: &Storage, url: &str, title: &str) -> Uuid {
        let name = format!("source {}", Uuid::now_v7());
        let source_id = add_source(storage, "D", &name, "test_data", "x").await;
        let mut lead = lead(url, title);
        FilingStation::new(storage)
            .file_lead(source_id, &mut lead)
            .await
            .unwrap()
            .uuid()
    }

    #[tokio::test]
    async fn promote_creates_case_and_clears_staging() {
        let storage = test_storage().await;
        let uuid = staged(&storage, "https://example.com/case", "A real case").await;

        let outcome = TriageService::new(&storage)
            .apply_triage_decision(uuid, TriageDecision::Promote)
            .await
            .unwrap();

        let TriageOutcome::Promoted(case) = outcome else {
            panic!("expected a case");
        };
        assert_eq!(case.lead_uuid, uuid);
        assert_eq!(case.title, "A real case");
        assert_ne!(case.public_uuid, uuid);
        assert!(storage.get_staged_lead(uuid).await.unwrap().is_none());
        let entry = storage.get_router_entry(uuid).await.unwrap().unwrap();
        assert_eq!(entry.status, LeadStatus::Promoted);
    }

    #[tokio::test]
    async fn ignore_then_refile_stays_ignored() {
        let storage = test_storage().await;
        let url = "https://example.com/noise";
        let uuid = staged(&storage, url, "Noise").await;

        let outcome = TriageService::new(&storage)
            .apply_triage_decision(uuid, TriageDecision::Ignore)
            .await
            .unwrap();
        assert_eq!(outcome, TriageOutcome::Ignored);
        assert!(storage.get_staged_lead(uuid).await.unwrap().is_none());

        // The same url arriving again is a duplicate, not a new lead.
        let again = staged(&storage, url, "Noise again").await;
        assert_eq!(again, uuid);
        assert_eq!(storage.count_staged().await.unwrap(), 0);
        let entry = storage.get_router_entry(uuid).await.unwrap().unwrap();
        assert_eq!(entry.status, LeadStatus::Ignored);
    }

    #[tokio::test]
    async fn skip_keeps_lead_under_review() {
        let storage = test_storage().await;
        let uuid = staged(&storage, "https://example.com/maybe", "Maybe").await;
        let service = TriageService::new(&storage);

        for _ in 0..2 {
            let outcome = service
                .apply_triage_decision(uuid, TriageDecision::Skip)
                .await
                .unwrap();
            assert_eq!(outcome, TriageOutcome::Triaged);
        }
        let listed = service.list_staged_leads(Some(LeadStatus::Triaged)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(service.list_staged_leads(Some(LeadStatus::New)).await.unwrap().is_empty());

        service
            .apply_triage_decision(uuid, TriageDecision::Promote)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn terminal_leads_reject_decisions() {
        let storage = test_storage().await;
        let uuid = staged(&storage, "https://example.com/done", "Done").await;
        let service = TriageService::new(&storage);
        service
            .apply_triage_decision(uuid, TriageDecision::Ignore)
            .await
            .unwrap();

        for decision in [TriageDecision::Promote, TriageDecision::Ignore, TriageDecision::Skip] {
            let err = service.apply_triage_decision(uuid, decision).await.unwrap_err();
            let HunterError::InvalidTransition { from, to, .. } = err else {
                panic!("expected an invalid transition, got {err}");
            };
            assert_eq!(from, "IGNORED");
            assert_eq!(to, decision.target_status().to_string());
            assert_eq!(to, to.to_uppercase());
        }
        assert!(storage.get_case_by_lead(uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_lead_is_not_found() {
        let storage = test_storage().await;
        let err = TriageService::new(&storage)
            .apply_triage_decision(Uuid::now_v7(), TriageDecision::Promote)
            .await
            .unwrap_err();
        assert!(matches!(err, HunterError::NotFound(_)));
    }

    #[tokio::test]
    async fn ignored_text_is_exported_for_training() {
        let storage = test_storage().await;
        let url = "https://example.com/export";
        let uuid = staged(&storage, url, "Local Council Meeting: Notes!").await;
        let dir = std::env::temp_dir().join(format!("hunter_export_{}", Uuid::now_v7()));

        TriageService::new(&storage)
            .with_export_dir(&dir)
            .apply_triage_decision(uuid, TriageDecision::Ignore)
            .await
            .unwrap();

        let expected = dir
            .join(NOT_A_CASE_DIR)
            .join(export_file_name("Local Council Meeting: Notes!", url));
        let content = std::fs::read_to_string(&expected).unwrap();
        assert_eq!(content, "Local Council Meeting: Notes! body");
    }

    #[test]
    fn export_names_are_slugged_and_hashed() {
        let name = export_file_name("Hello, World!", "https://example.com/a");
        assert!(name.starts_with("hello-world-"), "{name}");
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "hello-world-".len() + 8 + ".txt".len());

        assert_ne!(
            export_file_name("Same", "https://example.com/1"),
            export_file_name("Same", "https://example.com/2")
        );
        assert!(export_file_name("???", "u").starts_with("lead-"));
        let long = "word ".repeat(50);
        assert!(export_file_name(&long, "u").len() <= MAX_SLUG_LEN + 13);
    }
}
