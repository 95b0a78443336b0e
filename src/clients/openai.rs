//! OpenAI-compatible client used for three model-backed concerns:
//! structured summaries, highlight generation, and text embeddings.
//!
//! The embeddings endpoint may point at a separate OpenAI-compatible server
//! hosting the e5 model; query/passage prefixing follows the e5 convention.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::clients::{EmbeddingModel, HighlightModel, SummaryModel};
use crate::config::OpenAiConfig;
use crate::types::{AppError, AppResult, SummaryInput, SummaryMap};
use crate::utils::truncate_chars;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SUMMARY_CONTENT_CHARS: usize = 4000;
const MAX_HIGHLIGHT_SENTENCES: usize = 3;

const SUMMARIZATION_PROMPT: &str = "You are an expert research analyst. For each document below, extract a structured summary with exactly 5 sections:

1. problem: What problem or research question is being addressed?
2. approach: What methods, techniques, or approach is being used?
3. evidence_or_signals: What key evidence, data, signals, or traction is mentioned?
4. result: What are the main outcomes, findings, or achievements?
5. limitations: What limitations, challenges, or open questions remain?

Keep each section concise (1-2 sentences max). Be specific and factual.

You MUST respond with ONLY a valid JSON object mapping each document id to an object with keys: problem, approach, evidence_or_signals, result, limitations.";

const HIGHLIGHT_PROMPT: &str = "You select evidence for search results. Given a search query and a document text, pick up to 3 sentences from the text, verbatim, that best explain why the document is relevant to the query. Respond with ONLY a JSON array of strings. Do not include trailing sentence punctuation in the strings.";

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    embedding_api_base: String,
    summary_model: String,
    highlight_model: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            embedding_api_base: config.embedding_api_base.trim_end_matches('/').to_string(),
            summary_model: config.summary_model.clone(),
            highlight_model: config.highlight_model.clone(),
            embedding_model: config.embedding_model.clone(),
        }
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<String> {
        let payload = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat completion failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Chat completion status: {}", e)))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat completion parse error: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream("Chat completion returned no choices".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let payload = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let url = format!("{}/embeddings", self.embedding_api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Embedding request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Embedding error status: {}", e)))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Embedding parse error: {}", e)))?;

        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    /// Model output sometimes arrives wrapped in a markdown code fence.
    fn strip_code_fence(content: &str) -> &str {
        let trimmed = content.trim();
        let Some(inner) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        inner.trim_start().trim_end_matches('`').trim()
    }

    fn documents_block(documents: &[SummaryInput]) -> String {
        documents
            .iter()
            .map(|doc| {
                format!(
                    "Document ID: {}\nTitle: {}\nSource: {}\nContent: {}\n",
                    doc.id,
                    doc.title,
                    doc.source,
                    truncate_chars(&doc.content, SUMMARY_CONTENT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

#[async_trait]
impl SummaryModel for OpenAiClient {
    async fn summarize(&self, documents: &[SummaryInput]) -> AppResult<SummaryMap> {
        let user = Self::documents_block(documents);
        let content = self
            .chat(&self.summary_model, SUMMARIZATION_PROMPT, &user, 0.3, 1500)
            .await?;

        let summaries: SummaryMap = serde_json::from_str(Self::strip_code_fence(&content))
            .map_err(|e| AppError::Upstream(format!("Failed to parse summary JSON: {}", e)))?;

        info!(requested = documents.len(), returned = summaries.len(), "Summarization completed");
        Ok(summaries)
    }
}

#[async_trait]
impl HighlightModel for OpenAiClient {
    async fn highlights(&self, query: &str, text: &str) -> AppResult<Vec<String>> {
        let user = format!("Query: {}\n\nDocument text: {}", query, text);
        let content = self
            .chat(&self.highlight_model, HIGHLIGHT_PROMPT, &user, 0.0, 300)
            .await?;

        let mut highlights: Vec<String> =
            serde_json::from_str(Self::strip_code_fence(&content)).map_err(|e| {
                warn!(error = %e, "Highlight output was not a JSON array");
                AppError::Upstream(format!("Failed to parse highlight JSON: {}", e))
            })?;

        highlights.truncate(MAX_HIGHLIGHT_SENTENCES);
        Ok(highlights)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiClient {
    async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        let inputs = vec![format!("query: {}", query)];
        let mut vectors = self.embed(&inputs).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Upstream("Embedding response was empty".to_string()))
    }

    async fn embed_passages(&self, passages: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let inputs: Vec<String> = passages.iter().map(|p| format!("passage: {}", p)).collect();
        let vectors = self.embed(&inputs).await?;
        if vectors.len() != passages.len() {
            return Err(AppError::Upstream(format!(
                "Embedding count mismatch: sent {}, got {}",
                passages.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}
