//! External species/stat provider.
//!
//! Read-only lookups by numeric id, used solely to enrich agent prompts with
//! flavor context. Lookups degrade to empty flavor on any failure so provider
//! unavailability never blocks a turn, and nothing here ever reaches the
//! rules engine.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::SpeciesEndpoint;

/// Errors from species lookups.
#[derive(Debug, thiserror::Error)]
pub enum SpeciesError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Species {0} not found")]
    NotFound(u32),

    #[error("Response parse error: {0}")]
    ParseError(String),
}

/// Flavor record for one species.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesInfo {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub flavor: String,
}

/// The species-provider contract.
#[async_trait]
pub trait SpeciesProvider: Send + Sync {
    /// Look up a species by its numeric id.
    async fn lookup(&self, id: u32) -> Result<SpeciesInfo, SpeciesError>;
}

/// HTTP client for a species/stat API.
pub struct HttpSpeciesProvider {
    endpoint: SpeciesEndpoint,
    client: reqwest::Client,
}

impl HttpSpeciesProvider {
    /// Build a client for the configured endpoint.
    pub fn new(endpoint: SpeciesEndpoint) -> Result<Self, SpeciesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| SpeciesError::RequestFailed(e.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl SpeciesProvider for HttpSpeciesProvider {
    async fn lookup(&self, id: u32) -> Result<SpeciesInfo, SpeciesError> {
        let url = format!("{}/species/{id}", self.endpoint.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SpeciesError::RequestFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(SpeciesError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(SpeciesError::RequestFailed(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<SpeciesInfo>()
            .await
            .map_err(|e| SpeciesError::ParseError(e.to_string()))
    }
}

/// Query flavor text with graceful degradation: any failure returns an empty
/// string so the prompt simply goes out without flavor.
pub async fn flavor_with_failsafe(provider: Option<&dyn SpeciesProvider>, id: Option<u32>) -> String {
    let (provider, id) = match (provider, id) {
        (Some(p), Some(id)) => (p, id),
        _ => return String::new(),
    };
    match provider.lookup(id).await {
        Ok(info) if !info.flavor.is_empty() => format!("{}: {}", info.name, info.flavor),
        Ok(info) => info.name,
        Err(e) => {
            warn!(species = id, error = %e, "Species lookup failed — proceeding without flavor");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureProvider;

    #[async_trait]
    impl SpeciesProvider for FixtureProvider {
        async fn lookup(&self, id: u32) -> Result<SpeciesInfo, SpeciesError> {
            match id {
                25 => Ok(SpeciesInfo {
                    id,
                    name: "Sparkmouse".into(),
                    types: vec!["electric".into()],
                    flavor: "Stores static in its cheek pouches.".into(),
                }),
                7 => Ok(SpeciesInfo {
                    id,
                    name: "Shellpup".into(),
                    types: vec!["water".into()],
                    flavor: String::new(),
                }),
                _ => Err(SpeciesError::NotFound(id)),
            }
        }
    }

    #[tokio::test]
    async fn test_failsafe_formats_flavor() {
        let flavor = flavor_with_failsafe(Some(&FixtureProvider), Some(25)).await;
        assert_eq!(flavor, "Sparkmouse: Stores static in its cheek pouches.");
    }

    #[tokio::test]
    async fn test_failsafe_falls_back_to_name() {
        let flavor = flavor_with_failsafe(Some(&FixtureProvider), Some(7)).await;
        assert_eq!(flavor, "Shellpup");
    }

    #[tokio::test]
    async fn test_failsafe_swallows_errors() {
        let flavor = flavor_with_failsafe(Some(&FixtureProvider), Some(404)).await;
        assert_eq!(flavor, "");
    }

    #[tokio::test]
    async fn test_failsafe_without_provider() {
        assert_eq!(flavor_with_failsafe(None, Some(25)).await, "");
        assert_eq!(flavor_with_failsafe(Some(&FixtureProvider), None).await, "");
    }
}
