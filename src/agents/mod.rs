//! Analysis agents
//!
//! Every agent takes one request snapshot and produces an `AgentOutcome`.
//! The `run` wrapper enforces the no-throw contract: whatever goes wrong
//! inside an agent, the caller gets a neutral outcome and the pipeline
//! keeps going.

pub mod guard;
pub mod marketplace;
pub mod price_comparison;
pub mod reviews;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::schemas::{AgentOutcome, FlagType};

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent error types
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// External service failed (search, LLM provider)
    #[error("Service error: {0}")]
    Service(String),
}

/// Core agent trait - all generic-profile agents implement this
#[async_trait]
pub trait Agent: Send + Sync {
    type Request: Sync;

    /// Get agent name (used for logging and the per-agent output map)
    fn name(&self) -> &'static str;

    /// Produce an outcome; may fail internally
    async fn analyze(&self, request: &Self::Request) -> AgentResult<AgentOutcome>;

    /// No-throw entry point: failures become neutral outcomes
    async fn run(&self, request: &Self::Request) -> AgentOutcome {
        match self.analyze(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(agent = self.name(), "Agent failed, degrading: {}", e);
                AgentOutcome::degraded(e.to_string())
            }
        }
    }
}

// ============================================================================
// Threshold-tier classification
// ============================================================================

/// One tier of an ordered threshold table. A value selects the first tier
/// whose `upper` bound it is strictly below; tables end with an
/// `f64::INFINITY` catch-all.
#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub upper: f64,
    pub delta: i32,
    pub severity: Option<FlagType>,
    pub label: &'static str,
}

impl Tier {
    pub const fn new(
        upper: f64,
        delta: i32,
        severity: Option<FlagType>,
        label: &'static str,
    ) -> Self {
        Self {
            upper,
            delta,
            severity,
            label,
        }
    }
}

/// Classify a value against an ordered tier table
pub fn classify(value: f64, tiers: &[Tier]) -> Option<&Tier> {
    tiers
        .iter()
        .find(|t| value < t.upper)
        .or_else(|| tiers.last())
}

// ============================================================================
// URL helpers shared by the search-backed agents
// ============================================================================

/// Extract the host from a URL, dropping scheme, path and a leading `www.`
pub fn extract_domain(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host.strip_prefix("www.").unwrap_or(host);
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONGEVITY: &[Tier] = &[
        Tier::new(1.0, 30, Some(FlagType::Critical), "very_new"),
        Tier::new(2.0, 15, Some(FlagType::Warning), "new"),
        Tier::new(5.0, 0, Some(FlagType::Info), "established"),
        Tier::new(f64::INFINITY, -15, Some(FlagType::Info), "senior"),
    ];

    #[test]
    fn test_classify_picks_first_matching_tier() {
        let tier = classify(0.0, LONGEVITY).unwrap();
        assert_eq!(tier.label, "very_new");
        assert_eq!(tier.delta, 30);

        let tier = classify(1.0, LONGEVITY).unwrap();
        assert_eq!(tier.label, "new");

        let tier = classify(4.9, LONGEVITY).unwrap();
        assert_eq!(tier.label, "established");
    }

    #[test]
    fn test_classify_catch_all() {
        let tier = classify(40.0, LONGEVITY).unwrap();
        assert_eq!(tier.label, "senior");
        assert_eq!(tier.delta, -15);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.salomon.cl/shoes?x=1"), "salomon.cl");
        assert_eq!(extract_domain("http://tienda.example.com/p/1"), "tienda.example.com");
        assert_eq!(extract_domain("salomon.cl"), "salomon.cl");
    }

    #[tokio::test]
    async fn test_run_degrades_on_error() {
        struct FailingAgent;

        #[async_trait::async_trait]
        impl Agent for FailingAgent {
            type Request = ();

            fn name(&self) -> &'static str {
                "failing"
            }

            async fn analyze(&self, _request: &()) -> AgentResult<AgentOutcome> {
                Err(AgentError::Service("boom".to_string()))
            }
        }

        let outcome = FailingAgent.run(&()).await;
        assert!(outcome.flags.is_empty());
        assert_eq!(outcome.score_impact, 0);
        assert!(outcome.details.contains_key("error"));
    }
}
