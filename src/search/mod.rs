//! Web search client (Tavily)
//!
//! Used by the reviews and price-comparison agents. Callers treat a failed
//! search as "no results" rather than an error worth surfacing.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const API_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// One search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

pub struct SearchClient {
    client: Client,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<SearchResponse, SearchError> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "include_answer": true,
            "max_results": max_results,
        });

        let response = self.client.post(API_URL).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, body });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        Ok(parsed)
    }

    /// Search that degrades to an empty result set, logging the failure
    pub async fn search_or_empty(&self, query: &str, max_results: u32) -> SearchResponse {
        match self.search(query, max_results).await {
            Ok(response) => response,
            Err(e) => {
                warn!(query, "Search failed: {}", e);
                SearchResponse::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_with_missing_fields() {
        let json = r#"{"results": [{"url": "https://trustpilot.com/review/shop.cl"}]}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(response.answer.is_none());
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].title, "");
    }
}
