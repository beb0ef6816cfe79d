//! Shared types, error model, and configuration for Hunter.
//!
//! This crate is the foundation depended on by all other Hunter crates.
//! It provides:
//! - [`HunterError`]: the unified error type, plus [`FetchFailure`] and [`SkipReason`]
//! - Domain types ([`Lead`], [`LeadMetadata`], [`SourceConfig`], [`LeadStatus`], [`Case`])
//! - Configuration ([`AppConfig`], [`DispatchConfig`], [`CredentialStore`], config loading)

pub mod config;
pub mod error;
pub mod lead;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialStore, Credentials, DefaultsConfig, DispatchConfig, DispatchSection,
    HttpConfig, TriageConfig, config_dir, config_file_path, expand_path, init_config, load_config,
    load_config_from,
};
pub use error::{FetchFailure, FetchFailureKind, HunterError, Result, SkipReason};
pub use lead::{
    GNewsMetadata, Lead, LeadMetadata, NewLead, RedditMetadata, sentinel_publication_date,
};
pub use types::{
    Case, DEFAULT_PURPOSE, LeadStatus, NewSource, RouterEntry, SourceConfig, SourceDomain,
    SourceRunOutcome, StagedLead, TriageDecision,
};
