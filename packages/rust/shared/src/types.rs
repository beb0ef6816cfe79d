//! Core domain types: sources, the triage ledger, and cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lead::Lead;

/// Default purpose for sources that feed the triage queue.
pub const DEFAULT_PURPOSE: &str = "lead_generation";

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A grouping of sources that share an external API and its limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDomain {
    pub id: i64,
    pub name: String,
}

/// Persisted per-source configuration and run state.
///
/// Created by admin tooling, mutated only by the dispatch coordinator after a
/// run, never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: i64,
    pub name: String,
    /// Selects the scout/translator pair.
    pub agent_type: String,
    /// Subreddit, search query, file path… interpreted by the scout.
    pub target: String,
    pub domain_id: i64,
    /// Name of the owning domain; also a credentials key.
    pub domain_name: String,
    pub purpose: String,
    pub is_active: bool,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Bookmark: newest item id seen by an incremental scout.
    pub last_known_item_id: Option<String>,
}

/// Input for registering a new source.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub agent_type: String,
    pub target: String,
    pub domain_id: i64,
    pub purpose: String,
    pub is_active: bool,
}

/// Result of one source's run, as recorded by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRunOutcome {
    /// Fetch and filing succeeded. `None` keeps the stored bookmark.
    Success { new_bookmark: Option<String> },
    /// Fetch or filing failed. Bookmark untouched, failure counter +1.
    Failure,
}

// ---------------------------------------------------------------------------
// Triage state machine
// ---------------------------------------------------------------------------

/// Status of a router entry.
///
/// `New` is initial; `Promoted` and `Ignored` are terminal; `Triaged` marks a
/// lead as under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Triaged,
    Promoted,
    Ignored,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Triaged => "TRIAGED",
            Self::Promoted => "PROMOTED",
            Self::Ignored => "IGNORED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Promoted | Self::Ignored)
    }

    /// Status after applying `decision`, or `None` if the move is not allowed.
    pub fn after(self, decision: TriageDecision) -> Option<LeadStatus> {
        if self.is_terminal() {
            return None;
        }
        Some(decision.target_status())
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "TRIAGED" => Ok(Self::Triaged),
            "PROMOTED" => Ok(Self::Promoted),
            "IGNORED" => Ok(Self::Ignored),
            other => Err(format!("unknown lead status '{other}'")),
        }
    }
}

/// A human triage decision on a staged lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageDecision {
    /// File as a case.
    Promote,
    /// Not a case; drop the staged content.
    Ignore,
    /// Decide later; mark as under review.
    Skip,
}

impl TriageDecision {
    /// The status this decision moves a non-terminal lead to.
    pub fn target_status(self) -> LeadStatus {
        match self {
            Self::Promote => LeadStatus::Promoted,
            Self::Ignore => LeadStatus::Ignored,
            Self::Skip => LeadStatus::Triaged,
        }
    }
}

impl std::str::FromStr for TriageDecision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "promote" | "case" => Ok(Self::Promote),
            "ignore" | "not_a_case" => Ok(Self::Ignore),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown triage decision '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// Existence and status of one url. Created exactly once per unique url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterEntry {
    pub lead_uuid: Uuid,
    pub source_id: i64,
    pub item_url: String,
    pub publication_date: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: LeadStatus,
}

/// A staged lead joined with its router entry, as shown to a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedLead {
    pub lead: Lead,
    pub source_id: i64,
    pub status: LeadStatus,
    pub staged_at: DateTime<Utc>,
}

/// Permanent archive record created by promoting a staged lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    pub id: i64,
    pub lead_uuid: Uuid,
    pub public_uuid: Uuid,
    pub source_id: i64,
    pub source_name: String,
    pub title: String,
    pub url: String,
    pub publication_date: DateTime<Utc>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub image_url: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_triaged_accept_every_decision() {
        for from in [LeadStatus::New, LeadStatus::Triaged] {
            assert_eq!(from.after(TriageDecision::Promote), Some(LeadStatus::Promoted));
            assert_eq!(from.after(TriageDecision::Ignore), Some(LeadStatus::Ignored));
            assert_eq!(from.after(TriageDecision::Skip), Some(LeadStatus::Triaged));
        }
    }

    #[test]
    fn terminal_states_reject_decisions() {
        for from in [LeadStatus::Promoted, LeadStatus::Ignored] {
            assert!(from.is_terminal());
            for d in [TriageDecision::Promote, TriageDecision::Ignore, TriageDecision::Skip] {
                assert_eq!(from.after(d), None);
            }
        }
    }

    #[test]
    fn rejected_transition_names_statuses_in_one_form() {
        let err = crate::HunterError::invalid_transition(
            Uuid::nil(),
            LeadStatus::Ignored,
            TriageDecision::Skip,
        );
        match &err {
            crate::HunterError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "IGNORED");
                assert_eq!(to, "TRIAGED");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(err.to_string().contains("IGNORED cannot move to TRIAGED"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("new".parse::<LeadStatus>().unwrap(), LeadStatus::New);
        assert_eq!("PROMOTED".parse::<LeadStatus>().unwrap(), LeadStatus::Promoted);
        assert!("REVIEWING".parse::<LeadStatus>().is_err());
        assert_eq!(LeadStatus::Triaged.to_string(), "TRIAGED");
    }

    #[test]
    fn decision_accepts_legacy_names() {
        assert_eq!("case".parse::<TriageDecision>().unwrap(), TriageDecision::Promote);
        assert_eq!("not_a_case".parse::<TriageDecision>().unwrap(), TriageDecision::Ignore);
        assert_eq!("Skip".parse::<TriageDecision>().unwrap(), TriageDecision::Skip);
    }
}
