//! Server Configuration
//!
//! Environment-driven configuration for the analysis server.
//! API credentials are read once at startup; a missing key degrades the
//! relevant capability instead of failing the process.

use serde::{Deserialize, Serialize};
use std::env;

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS (the browser extension calls from arbitrary origins)
    pub enable_cors: bool,
    /// Log level
    pub log_level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            host: env::var("CARTGUARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("CARTGUARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            enable_cors: env::var("CARTGUARD_ENABLE_CORS")
                .map(|v| v != "false")
                .unwrap_or(true),
            log_level: env::var("CARTGUARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Get bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tracing filter directive for the configured level. Debug and trace
    /// also open up axum's request logs.
    pub fn env_filter(&self) -> String {
        match self.log_level.as_str() {
            "debug" | "trace" => format!("cartguard={0},axum={0}", self.log_level),
            level => format!("cartguard={}", level),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
            log_level: "info".to_string(),
        }
    }
}

/// Third-party API credentials, read once at startup
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub anthropic_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }

    pub fn has_llm(&self) -> bool {
        self.anthropic_api_key.is_some()
    }

    pub fn has_search(&self) -> bool {
        self.tavily_api_key.is_some()
    }

    /// Log a startup warning for each missing credential. The server still
    /// starts; the affected agents return neutral outcomes.
    pub fn warn_missing(&self) {
        if !self.has_llm() {
            tracing::warn!(
                "ANTHROPIC_API_KEY not set - LLM analysis disabled, agents degrade to neutral outcomes"
            );
        }
        if !self.has_search() {
            tracing::warn!(
                "TAVILY_API_KEY not set - web search disabled, reviews/price agents degrade"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_filter_follows_log_level() {
        let config = ServerConfig::default();
        assert_eq!(config.env_filter(), "cartguard=info");

        let config = ServerConfig {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        assert_eq!(config.env_filter(), "cartguard=debug,axum=debug");
    }

    #[test]
    fn test_credentials_presence() {
        let creds = Credentials {
            anthropic_api_key: Some("sk-test".to_string()),
            tavily_api_key: None,
        };
        assert!(creds.has_llm());
        assert!(!creds.has_search());
    }
}
