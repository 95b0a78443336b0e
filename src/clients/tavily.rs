//! Tavily client for real-time web search.
//!
//! The web channel is best-effort: a missing API key, timeout, non-2xx status
//! or parse failure all degrade to an empty result list so the overall search
//! request is never blocked on this path.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::WebSearch;
use crate::config::TavilyConfig;
use crate::types::WebResult;
use crate::utils::truncate_chars;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum TavilyError {
    #[error("Tavily API key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyItem>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
    published_date: Option<String>,
}

impl TavilyClient {
    pub fn new(config: &TavilyConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebResult>, TavilyError> {
        if self.api_key.is_empty() {
            return Err(TavilyError::NoApiKey);
        }

        let payload = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic",
        });

        let response = self
            .http
            .post(TAVILY_API_URL)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TavilyError::RequestFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| TavilyError::RequestFailed(e.to_string()))?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| TavilyError::ParseError(e.to_string()))?;

        let normalized = parsed
            .results
            .into_iter()
            .map(|item| WebResult {
                snippet: truncate_chars(&item.content, SNIPPET_CHARS),
                title: item.title,
                url: item.url,
                content: item.content,
                score: item.score,
                published_date: item.published_date,
            })
            .collect::<Vec<_>>();

        info!(count = normalized.len(), "Tavily search returned");
        Ok(normalized)
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult> {
        match self.search_inner(query, max_results).await {
            Ok(results) => results,
            Err(TavilyError::NoApiKey) => {
                warn!("Tavily API key not set, returning empty results");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Web search failed, degrading to empty results");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_degrades_to_empty() {
        let client = TavilyClient::new(&TavilyConfig {
            api_key: String::new(),
        });
        let results = client.search("battery startups", 10).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_response_parsing_and_snippet() {
        let body = json!({
            "results": [{
                "title": "VoltCo",
                "url": "https://voltco.example",
                "content": "a".repeat(500),
                "score": 0.93,
                "published_date": "2024-01-02",
            }]
        });
        let parsed: TavilyResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(truncate_chars(&parsed.results[0].content, 200).len(), 200);
    }
}
