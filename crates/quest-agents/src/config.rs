//! Endpoint configuration for the agent layer.
//!
//! Loaded from TOML with environment-variable overrides, so a deployment can
//! point the swarm at a different reasoning proxy without editing files.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Reasoning-service endpoint (OpenAI-style completion proxy).
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningEndpoint {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    900
}

fn default_temperature() -> f64 {
    0.8
}

fn default_timeout_secs() -> u64 {
    60
}

/// Species/stat provider endpoint (read-only flavor lookups).
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesEndpoint {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Top-level agent-layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    pub reasoning: ReasoningEndpoint,
    #[serde(default)]
    pub species: Option<SpeciesEndpoint>,
}

impl AgentsConfig {
    /// Parse a TOML document, then apply environment overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(raw).context("Failed to parse agents configuration")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build a config purely from environment variables, for deployments
    /// with no config file. `QUEST_REASONING_URL` and `QUEST_REASONING_MODEL`
    /// are required.
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("QUEST_REASONING_URL").context("QUEST_REASONING_URL is not set")?;
        let model =
            std::env::var("QUEST_REASONING_MODEL").context("QUEST_REASONING_MODEL is not set")?;
        let mut config = Self {
            reasoning: ReasoningEndpoint {
                url,
                api_key: String::new(),
                model,
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                timeout_secs: default_timeout_secs(),
            },
            species: None,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QUEST_REASONING_URL") {
            self.reasoning.url = url;
        }
        if let Ok(key) = std::env::var("QUEST_REASONING_API_KEY") {
            self.reasoning.api_key = key;
        }
        if let Ok(model) = std::env::var("QUEST_REASONING_MODEL") {
            self.reasoning.model = model;
        }
        if let Ok(url) = std::env::var("QUEST_SPECIES_URL") {
            let timeout_secs = self
                .species
                .as_ref()
                .map(|s| s.timeout_secs)
                .unwrap_or_else(default_timeout_secs);
            self.species = Some(SpeciesEndpoint { url, timeout_secs });
        }
    }
}
