//! Scouts, translators, and the agent registry.
//!
//! This crate provides:
//! - [`Scout`]: per-source-type raw fetcher (network or disk, never the database)
//! - [`Translator`]: per-source-type normalizer from [`RawRecord`]s to canonical leads
//! - [`AgentRegistry`]: static map from agent-type strings to scout/translator pairs
//! - Built-in agents: `reddit`, `gnews_io`, `test_data`

pub mod http;
pub mod raw;
pub mod registry;
pub mod scouts;
pub mod translators;

pub use http::build_client;
pub use raw::{FixtureRecord, GNewsArticle, GNewsOutlet, RawRecord, RedditPost};
pub use registry::{AgentPair, AgentRegistry};
pub use scouts::{
    BookmarkStrategy, FixtureScout, GNewsScout, RedditScout, Scout, ScoutReport,
    take_until_bookmark,
};
pub use translators::{FixtureTranslator, GNewsTranslator, RedditTranslator, Translator};
