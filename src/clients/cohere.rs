//! Cohere Rerank client (cross-encoder relevance scoring).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::clients::RerankModel;
use crate::config::CohereConfig;
use crate::types::{AppError, AppResult, RetrievalCandidate};

const COHERE_RERANK_URL: &str = "https://api.cohere.ai/v1/rerank";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct CohereClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankEntry>,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    index: usize,
    relevance_score: f32,
}

impl CohereClient {
    pub fn new(config: &CohereConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            model: config.rerank_model.clone(),
        }
    }

    /// Text presented to the cross-encoder: title plus snippet.
    fn document_text(candidate: &RetrievalCandidate) -> String {
        format!("{} {}", candidate.title, candidate.snippet)
            .trim()
            .to_string()
    }
}

#[async_trait]
impl RerankModel for CohereClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[RetrievalCandidate],
        top_n: usize,
    ) -> AppResult<Vec<(usize, f32)>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = documents.iter().map(Self::document_text).collect();

        let payload = json!({
            "model": self.model,
            "query": query,
            "documents": texts,
            "top_n": top_n.min(texts.len()),
            "return_documents": false,
        });

        let response = self
            .http
            .post(COHERE_RERANK_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Cohere rerank failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Cohere error status: {}", e)))?;

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Cohere parse error: {}", e)))?;

        info!(
            input = documents.len(),
            output = parsed.results.len(),
            "Rerank completed"
        );

        Ok(parsed
            .results
            .into_iter()
            .map(|entry| (entry.index, entry.relevance_score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn test_document_text_joins_title_and_snippet() {
        let candidate = RetrievalCandidate {
            doc_id: "d1".into(),
            source: Source::Papers,
            score: 1.0,
            title: "Solid-state batteries".into(),
            snippet: "A study of electrolytes.".into(),
            metadata: serde_json::json!({}),
        };
        assert_eq!(
            CohereClient::document_text(&candidate),
            "Solid-state batteries A study of electrolytes."
        );
    }
}
