//! Dispatch Coordinator: fan out one worker per source domain.
//!
//! Each domain worker runs its sources one after another so a shared
//! upstream API only ever sees one request stream from us, while distinct
//! domains run in parallel. Per source:
//!
//! Scout (with deadline) → Translator → Filing Station → source state update
//!
//! The state update is the last step and only records success when the
//! whole batch filed. Anything that goes wrong is contained at the source:
//! siblings in the same domain and other domains carry on.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hunter_agents::{AgentRegistry, Scout, ScoutReport};
use hunter_shared::{
    CredentialStore, DispatchConfig, FetchFailure, FetchFailureKind, SourceConfig,
    SourceRunOutcome,
};
use hunter_storage::Storage;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::filing::{FilingReport, FilingStation};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How one source's run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceRunStatus {
    Succeeded,
    /// The scout reported the source as broken (or timed out).
    FetchFailed { kind: String, message: String },
    /// Some leads could not be persisted; the bookmark was held back.
    FilingFailed { failed: usize },
    /// The source's task panicked or its worker could not start.
    Crashed(String),
    /// The run itself finished but its state could not be recorded.
    StateNotRecorded(String),
}

impl SourceRunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    fn fetch_failed(failure: &FetchFailure) -> Self {
        Self::FetchFailed {
            kind: failure.kind.to_string(),
            message: failure.message.clone(),
        }
    }
}

impl std::fmt::Display for SourceRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => f.write_str("ok"),
            Self::FetchFailed { kind, message } => write!(f, "{kind} failure: {message}"),
            Self::FilingFailed { failed } => write!(f, "{failed} lead(s) failed to file"),
            Self::Crashed(msg) => write!(f, "crashed: {msg}"),
            Self::StateNotRecorded(msg) => write!(f, "state not recorded: {msg}"),
        }
    }
}

/// Per-source result of a dispatch run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source_id: i64,
    pub source_name: String,
    pub domain_id: i64,
    pub status: SourceRunStatus,
    pub fetched: usize,
    pub translated: usize,
    pub filed: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Bookmark written by this run, if it moved.
    pub new_bookmark: Option<String>,
}

impl SourceOutcome {
    fn new(source: &SourceConfig, status: SourceRunStatus) -> Self {
        Self {
            source_id: source.id,
            source_name: source.name.clone(),
            domain_id: source.domain_id,
            status,
            fetched: 0,
            translated: 0,
            filed: 0,
            duplicates: 0,
            failed: 0,
            new_bookmark: None,
        }
    }
}

/// Everything a finished dispatch run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per dispatched source, grouped by domain.
    pub outcomes: Vec<SourceOutcome>,
    /// True when the coordinator itself died before finishing.
    pub aborted: bool,
}

impl DispatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_filed(&self) -> usize {
        self.outcomes.iter().map(|o| o.filed).sum()
    }

    pub fn outcome(&self, source_id: i64) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    fn aborted() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
            aborted: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Completion signal
// ---------------------------------------------------------------------------

/// Fires once every domain worker has finished.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    rx: watch::Receiver<Option<Arc<DispatchSummary>>>,
}

impl CompletionSignal {
    /// Non-blocking check.
    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The summary, once complete.
    pub fn summary(&self) -> Option<Arc<DispatchSummary>> {
        self.rx.borrow().clone()
    }

    /// Wait for the run to finish.
    pub async fn wait(&self) -> Arc<DispatchSummary> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(done) => done.clone().unwrap_or_else(|| Arc::new(DispatchSummary::aborted())),
            Err(_) => {
                error!("dispatch coordinator exited without reporting");
                Arc::new(DispatchSummary::aborted())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct Inner {
    storage: Arc<Storage>,
    registry: AgentRegistry,
    credentials: CredentialStore,
    config: DispatchConfig,
}

/// Runs sources through the pipeline, one worker per domain.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<Storage>,
        registry: AgentRegistry,
        credentials: CredentialStore,
        config: DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                registry,
                credentials,
                config,
            }),
        }
    }

    /// Start a run over `sources` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, sources: Vec<SourceConfig>) -> CompletionSignal {
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let summary = coordinate(inner, sources).await;
            // Receivers may all be gone; nothing to do then.
            let _ = tx.send(Some(Arc::new(summary)));
        });
        CompletionSignal { rx }
    }
}

/// Group by domain, keeping the incoming order within each domain.
fn group_by_domain(sources: Vec<SourceConfig>) -> BTreeMap<i64, Vec<SourceConfig>> {
    let mut domains: BTreeMap<i64, Vec<SourceConfig>> = BTreeMap::new();
    for source in sources {
        domains.entry(source.domain_id).or_default().push(source);
    }
    domains
}

#[instrument(skip_all, fields(sources = sources.len()))]
async fn coordinate(inner: Arc<Inner>, sources: Vec<SourceConfig>) -> DispatchSummary {
    let started_at = Utc::now();
    let domains = group_by_domain(sources);
    info!(domains = domains.len(), "dispatch started");

    let mut workers = Vec::with_capacity(domains.len());
    for (domain_id, sources) in domains {
        let roster = sources.clone();
        let inner = Arc::clone(&inner);
        let handle = tokio::spawn(
            run_domain(inner, sources).instrument(info_span!("domain", domain_id)),
        );
        workers.push((domain_id, roster, handle));
    }

    let mut outcomes = Vec::new();
    for (domain_id, roster, handle) in workers {
        match handle.await {
            Ok(domain_outcomes) => outcomes.extend(domain_outcomes),
            Err(e) => {
                // Last resort: the worker itself died outside a source task.
                error!(domain_id, error = %e, "domain worker crashed");
                outcomes.extend(roster.iter().map(|source| {
                    SourceOutcome::new(source, SourceRunStatus::Crashed(e.to_string()))
                }));
            }
        }
    }

    let summary = DispatchSummary {
        started_at,
        finished_at: Utc::now(),
        outcomes,
        aborted: false,
    };
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        filed = summary.total_filed(),
        "dispatch complete"
    );
    summary
}

async fn run_domain(inner: Arc<Inner>, sources: Vec<SourceConfig>) -> Vec<SourceOutcome> {
    let storage = match inner.storage.connect_worker().await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!(error = %e, "domain worker could not open a connection");
            return sources
                .iter()
                .map(|source| SourceOutcome::new(source, SourceRunStatus::Crashed(e.to_string())))
                .collect();
        }
    };

    let mut outcomes = Vec::with_capacity(sources.len());
    for source in sources {
        let task = tokio::spawn(run_source(
            Arc::clone(&inner),
            Arc::clone(&storage),
            source.clone(),
        ));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(source_id = source.id, source = %source.name, error = %e, "source task crashed");
                let status = match record_state(&storage, &source, SourceRunOutcome::Failure).await {
                    Ok(()) => SourceRunStatus::Crashed(e.to_string()),
                    Err(state_err) => SourceRunStatus::StateNotRecorded(format!(
                        "{e}; then {state_err}"
                    )),
                };
                SourceOutcome::new(&source, status)
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

#[instrument(skip_all, fields(source_id = source.id, source = %source.name, agent_type = %source.agent_type))]
async fn run_source(inner: Arc<Inner>, storage: Arc<Storage>, source: SourceConfig) -> SourceOutcome {
    let Some(pair) = inner.registry.get(&source.agent_type) else {
        let failure = FetchFailure::source(format!("no agent registered for '{}'", source.agent_type));
        return fail_source(&storage, &source, SourceRunStatus::fetch_failed(&failure)).await;
    };

    let credentials = inner
        .credentials
        .lookup(&source.domain_name, &source.agent_type);

    let report = match fetch_with_deadline(pair.scout.as_ref(), &source, credentials.as_ref(), &inner.config).await {
        Ok(report) => report,
        Err(failure) => {
            warn!(kind = %failure.kind, error = %failure.message, "scout failed");
            return fail_source(&storage, &source, SourceRunStatus::fetch_failed(&failure)).await;
        }
    };

    let fetched = report.records.len();
    let mut leads = pair.translator.translate(&source, report.records);
    let translated = leads.len();
    let filing: FilingReport = FilingStation::new(&storage)
        .file_leads(source.id, &mut leads)
        .await;

    let mut outcome = SourceOutcome::new(&source, SourceRunStatus::Succeeded);
    outcome.fetched = fetched;
    outcome.translated = translated;
    outcome.filed = filing.filed.len();
    outcome.duplicates = filing.duplicates.len();
    outcome.failed = filing.failed.len();

    if filing.has_failures() {
        // Holding the bookmark makes the next run retry the failed leads.
        warn!(failed = filing.failed.len(), "filing failures, run marked failed");
        outcome.status = SourceRunStatus::FilingFailed {
            failed: filing.failed.len(),
        };
        if let Err(e) = record_state(&storage, &source, SourceRunOutcome::Failure).await {
            outcome.status = SourceRunStatus::StateNotRecorded(e.to_string());
        }
        return outcome;
    }

    let new_bookmark = next_bookmark(
        pair.scout.as_ref(),
        source.last_known_item_id.as_deref(),
        report.newest_bookmark,
    );
    let state = SourceRunOutcome::Success {
        new_bookmark: new_bookmark.clone(),
    };
    match record_state(&storage, &source, state).await {
        Ok(()) => outcome.new_bookmark = new_bookmark,
        Err(e) => outcome.status = SourceRunStatus::StateNotRecorded(e.to_string()),
    }

    info!(
        fetched,
        translated,
        filed = outcome.filed,
        duplicates = outcome.duplicates,
        "source run complete"
    );
    outcome
}

async fn fetch_with_deadline(
    scout: &dyn Scout,
    source: &SourceConfig,
    credentials: Option<&hunter_shared::Credentials>,
    config: &DispatchConfig,
) -> Result<ScoutReport, FetchFailure> {
    match tokio::time::timeout(config.scout_timeout, scout.fetch(source, credentials)).await {
        Ok(result) => result,
        Err(_) => Err(FetchFailure::new(
            FetchFailureKind::Timeout,
            format!("scout exceeded {}s deadline", config.scout_timeout.as_secs()),
        )),
    }
}

/// The bookmark to store after a successful run, if it should move.
///
/// The scout decides ordering; a candidate that is not newer than the stored
/// bookmark is discarded so a successful run never moves it backwards.
fn next_bookmark(scout: &dyn Scout, previous: Option<&str>, candidate: Option<String>) -> Option<String> {
    let candidate = candidate?;
    match previous {
        Some(previous) if previous == candidate => None,
        Some(previous) if !scout.is_newer_bookmark(previous, &candidate) => {
            warn!(%previous, %candidate, "stale bookmark from scout ignored");
            None
        }
        _ => Some(candidate),
    }
}

async fn fail_source(storage: &Storage, source: &SourceConfig, status: SourceRunStatus) -> SourceOutcome {
    let status = match record_state(storage, source, SourceRunOutcome::Failure).await {
        Ok(()) => status,
        Err(e) => SourceRunStatus::StateNotRecorded(e.to_string()),
    };
    SourceOutcome::new(source, status)
}

async fn record_state(
    storage: &Storage,
    source: &SourceConfig,
    outcome: SourceRunOutcome,
) -> hunter_shared::Result<()> {
    debug!(source_id = source.id, ?outcome, "recording source state");
    storage
        .update_source_state(source.id, &outcome)
        .await
        .inspect_err(|e| error!(source_id = source.id, error = %e, "failed to record source state"))
}
