//! Acquisition pipeline orchestration for Hunter.
//!
//! This crate ties scouts, translators, and the ledger together:
//! - [`filing`]: the Filing Station, batch dedup plus atomic per-lead filing
//! - [`dispatch`]: the Dispatch Coordinator, one worker per source domain
//! - [`triage`]: human triage decisions and training-data export

pub mod dispatch;
pub mod filing;
pub mod triage;

pub use dispatch::{
    CompletionSignal, DispatchSummary, Dispatcher, SourceOutcome, SourceRunStatus,
};
pub use filing::{FilingReport, FilingStation};
pub use triage::{TriageOutcome, TriageService};
