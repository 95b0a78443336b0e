//! External service gateways.
//!
//! Each collaborator is behind its own trait so the pipeline can be wired
//! with fakes in tests and no client state hides in process-wide globals:
//! - OpenSearch (BM25 lexical search + bulk indexing)
//! - Pinecone (dense vector search + upsert)
//! - Tavily (live web search, best-effort)
//! - Cohere (cross-encoder reranking)
//! - OpenAI-compatible chat/embeddings (summaries, highlights, vectors)

pub mod cohere;
pub mod openai;
pub mod opensearch;
pub mod pinecone;
pub mod tavily;

pub use cohere::CohereClient;
pub use openai::OpenAiClient;
pub use opensearch::OpenSearchClient;
pub use pinecone::PineconeClient;
pub use tavily::TavilyClient;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::{
    AppResult, RetrievalCandidate, SearchFilters, SummaryInput, SummaryMap, WebResult,
};

/// BM25-style keyword retrieval.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalCandidate>>;
}

/// Nearest-neighbor retrieval over a dense vector index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalCandidate>>;
}

/// Live web search for startup-type entities.
///
/// This channel is best-effort by contract: implementations log failures and
/// return an empty list instead of erroring, so the overall search is never
/// blocked by the web path.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult>;
}

/// Cross-encoder relevance scoring of a candidate list.
///
/// Returns `(input_index, relevance_score)` pairs; callers fall back to the
/// pre-rerank order on failure.
#[async_trait]
pub trait RerankModel: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: &[RetrievalCandidate],
        top_n: usize,
    ) -> AppResult<Vec<(usize, f32)>>;
}

/// "Why this result" fragment generation for one result's text.
#[async_trait]
pub trait HighlightModel: Send + Sync {
    async fn highlights(&self, query: &str, text: &str) -> AppResult<Vec<String>>;
}

/// Batched 5-field structured summarization. No degraded fallback exists, so
/// failures propagate to the caller.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn summarize(&self, documents: &[SummaryInput]) -> AppResult<SummaryMap>;
}

/// Text embedding used for the vector gateway's query and chunk vectors
/// during indexing. Prefixing follows the e5 query/passage convention.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>>;
    async fn embed_passages(&self, passages: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

/// One document prepared for the lexical index.
#[derive(Debug, Clone)]
pub struct LexicalDocument {
    pub doc_id: String,
    pub external_id: String,
    pub title: String,
    pub text: String,
    pub year: Option<i32>,
    pub metadata: serde_json::Value,
}

/// One embedded chunk prepared for the vector index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Bulk lexical-index write outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub errors: usize,
}

/// Write side of the lexical index.
#[async_trait]
pub trait LexicalIndexer: Send + Sync {
    async fn bulk_index(
        &self,
        source: crate::types::Source,
        documents: &[LexicalDocument],
    ) -> AppResult<BulkOutcome>;
}

/// Write side of the vector index.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize>;
}
