//! Static registry mapping agent-type strings to scout/translator pairs.
//!
//! Built once at startup and validated against every agent type referenced
//! by persisted sources, so a typo in the database fails the run up front
//! instead of one source at a time.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use hunter_shared::{HunterError, Result};
use reqwest::Client;

use crate::scouts::{FixtureScout, GNewsScout, RedditScout, Scout};
use crate::translators::{FixtureTranslator, GNewsTranslator, RedditTranslator, Translator};

/// The scout and translator for one agent type.
#[derive(Clone)]
pub struct AgentPair {
    pub scout: Arc<dyn Scout>,
    pub translator: Arc<dyn Translator>,
}

/// Holds registered agent pairs keyed by agent type.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentPair>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with all built-in agents sharing one HTTP client.
    pub fn builtin(client: Client) -> Self {
        let mut registry = Self::new();
        registry.register(
            "reddit",
            Arc::new(RedditScout::new(client.clone())),
            Arc::new(RedditTranslator),
        );
        registry.register(
            "gnews_io",
            Arc::new(GNewsScout::new(client)),
            Arc::new(GNewsTranslator),
        );
        registry.register("test_data", Arc::new(FixtureScout), Arc::new(FixtureTranslator));
        registry
    }

    /// Add or replace the pair for `agent_type`.
    pub fn register(
        &mut self,
        agent_type: impl Into<String>,
        scout: Arc<dyn Scout>,
        translator: Arc<dyn Translator>,
    ) {
        let agent_type = agent_type.into();
        tracing::debug!(%agent_type, scout = scout.name(), "registered agent");
        self.agents
            .insert(agent_type, AgentPair { scout, translator });
    }

    pub fn get(&self, agent_type: &str) -> Option<&AgentPair> {
        self.agents.get(agent_type)
    }

    /// Registered agent types, sorted.
    pub fn agent_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Fail if any referenced agent type has no registered pair.
    pub fn validate<S: AsRef<str>>(&self, referenced: &[S]) -> Result<()> {
        let unknown: BTreeSet<String> = referenced
            .iter()
            .map(AsRef::as_ref)
            .filter(|agent_type| !self.agents.contains_key(*agent_type))
            .map(String::from)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(HunterError::UnknownAgentType(unknown.into_iter().collect()))
        }
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_types", &self.agent_types())
            .finish()
    }
}
