//! Agent descriptors and the validated roster used by the orchestrator

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named remote model configuration. Immutable once the roster is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub display_name: String,
    /// Prompt id for the agent endpoint, or model URI for the completion endpoint
    pub remote_id: String,
    /// Price table key, e.g. `yandexgpt-lite`
    pub model_type: String,
    #[serde(default)]
    pub price_per_1k_input: Option<f64>,
    #[serde(default)]
    pub price_per_1k_output: Option<f64>,
}

impl AgentDescriptor {
    pub fn new(
        display_name: impl Into<String>,
        remote_id: impl Into<String>,
        model_type: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            remote_id: remote_id.into(),
            model_type: model_type.into(),
            price_per_1k_input: None,
            price_per_1k_output: None,
        }
    }

    pub fn with_prices(mut self, input: f64, output: f64) -> Self {
        self.price_per_1k_input = Some(input);
        self.price_per_1k_output = Some(output);
        self
    }
}

/// Ordered, non-empty list of agents with unique remote ids
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    agents: Vec<AgentDescriptor>,
}

impl Roster {
    pub fn new(agents: Vec<AgentDescriptor>) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::InvalidRoster("roster is empty".into()));
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if agent.display_name.trim().is_empty() {
                return Err(Error::InvalidRoster(format!(
                    "agent '{}' has a blank display name",
                    agent.remote_id
                )));
            }
            if agent.remote_id.trim().is_empty() {
                return Err(Error::InvalidRoster(format!(
                    "agent '{}' has a blank remote id",
                    agent.display_name
                )));
            }
            if !seen.insert(agent.remote_id.as_str()) {
                return Err(Error::InvalidRoster(format!(
                    "duplicate remote id '{}'",
                    agent.remote_id
                )));
            }
        }

        Ok(Self { agents })
    }

    /// First agent; used by single-agent mode
    pub fn primary(&self) -> &AgentDescriptor {
        &self.agents[0]
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.iter()
    }
}
