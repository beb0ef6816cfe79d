//! Error types for Hunter.
//!
//! Library crates use [`HunterError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-record and per-lead problems in the acquisition pipeline are *not*
//! errors of this type: translators log a [`SkipReason`] and move on, and
//! the filing station collects failures into its report. [`FetchFailure`] is
//! the one value a scout returns when a source is broken rather than quiet.

use std::path::PathBuf;

/// Top-level error type for all Hunter operations.
#[derive(Debug, thiserror::Error)]
pub enum HunterError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of a scout run.
    #[error("network error: {0}")]
    Network(String),

    /// Payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty required field, missing content, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A triage decision that the lead's current status does not allow.
    #[error("invalid transition for lead {lead_uuid}: {from} cannot move to {to}")]
    InvalidTransition {
        lead_uuid: String,
        from: String,
        to: String,
    },

    /// Persisted sources reference agent types the registry does not know.
    #[error("unknown agent type(s): {}", .0.join(", "))]
    UnknownAgentType(Vec<String>),

    /// A record looked up by key does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HunterError>;

impl HunterError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// A decision the lead's current status does not allow. Both statuses
    /// use their uppercase ledger form.
    pub fn invalid_transition(
        lead_uuid: uuid::Uuid,
        from: crate::types::LeadStatus,
        decision: crate::types::TriageDecision,
    ) -> Self {
        Self::InvalidTransition {
            lead_uuid: lead_uuid.to_string(),
            from: from.to_string(),
            to: decision.target_status().to_string(),
        }
    }

    /// Wrap any displayable storage-layer error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Scout failures
// ---------------------------------------------------------------------------

/// Why a scout could not produce a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// Missing or rejected credentials.
    Auth,
    /// Transport error or unexpected HTTP status.
    Network,
    /// The upstream API refused us for rate/quota reasons.
    Quota,
    /// The scout exceeded its per-call deadline.
    Timeout,
    /// The source itself is unusable (bad target, unreadable payload).
    Source,
}

impl std::fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Quota => "quota",
            Self::Timeout => "timeout",
            Self::Source => "source",
        };
        f.write_str(s)
    }
}

/// Unrecoverable per-source scout error. Distinct from an empty batch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Network, message)
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Source, message)
    }

    /// Classify an HTTP status code returned by an upstream API.
    pub fn from_status(status: u16, context: &str) -> Self {
        let kind = match status {
            401 | 403 => FetchFailureKind::Auth,
            429 => FetchFailureKind::Quota,
            _ => FetchFailureKind::Network,
        };
        Self::new(kind, format!("{context}: HTTP {status}"))
    }
}

// ---------------------------------------------------------------------------
// Translation skips
// ---------------------------------------------------------------------------

/// Why a translator dropped a raw record. Logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A field the canonical lead requires is absent or blank.
    MissingField(&'static str),
    /// The record had neither usable text nor html.
    InvalidContent(String),
    /// The record belongs to a different source type.
    UnexpectedRecord(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
            Self::InvalidContent(msg) => write!(f, "invalid content: {msg}"),
            Self::UnexpectedRecord(kind) => write!(f, "unexpected record kind '{kind}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(FetchFailure::from_status(401, "x").kind, FetchFailureKind::Auth);
        assert_eq!(FetchFailure::from_status(403, "x").kind, FetchFailureKind::Auth);
        assert_eq!(FetchFailure::from_status(429, "x").kind, FetchFailureKind::Quota);
        assert_eq!(FetchFailure::from_status(502, "x").kind, FetchFailureKind::Network);
    }

    #[test]
    fn unknown_agent_types_are_listed() {
        let err = HunterError::UnknownAgentType(vec!["rss".into(), "mastodon".into()]);
        assert_eq!(err.to_string(), "unknown agent type(s): rss, mastodon");
    }
}
