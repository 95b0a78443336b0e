//! Search orchestration for a single request.
//!
//! The web-search path and the database path (hybrid retrieve → rerank →
//! highlight) run concurrently; neither waits on the other. The response
//! keeps the two channels as separately labeled lists because web startups
//! and indexed papers carry non-comparable scores.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::clients::{
    HighlightModel, LexicalSearch, RerankModel, SummaryModel, VectorSearch, WebSearch,
};
use crate::models::{SearchRequest, SearchResponse};
use crate::search::highlight::Highlighter;
use crate::search::rerank::{Reranker, MAX_RERANK_TOP_N};
use crate::search::retriever::HybridRetriever;
use crate::search::summarize::Summarizer;
use crate::types::{
    AppError, AppResult, RankedDocument, SearchFilters, Source, SummaryInput, SummarySection,
    WebResult,
};

pub const MAX_QUERY_CHARS: usize = 512;
pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Fused candidate count handed to the reranker.
pub const RETRIEVAL_TOP_K: usize = 256;

/// Cap on the web-search startups list.
pub const STARTUP_RESULTS_CAP: usize = 10;

pub struct SearchPipeline {
    retriever: HybridRetriever,
    reranker: Reranker,
    highlighter: Highlighter,
    summarizer: Summarizer,
    web: Arc<dyn WebSearch>,
}

impl SearchPipeline {
    pub fn new(
        lexical: Arc<dyn LexicalSearch>,
        vector: Arc<dyn VectorSearch>,
        web: Arc<dyn WebSearch>,
        rerank: Arc<dyn RerankModel>,
        highlight: Arc<dyn HighlightModel>,
        summary: Arc<dyn SummaryModel>,
    ) -> Self {
        Self {
            retriever: HybridRetriever::new(lexical, vector),
            reranker: Reranker::new(rerank),
            highlighter: Highlighter::new(highlight),
            summarizer: Summarizer::new(summary),
            web,
        }
    }

    /// Run one search request end to end.
    ///
    /// Fails only when the database path throws; the web path degrades to an
    /// empty list by contract. The `source`/`year_gte` filters apply to the
    /// database path only: the startups list is live discovery, not part of
    /// the filtered corpus.
    pub async fn search(&self, request: SearchRequest) -> AppResult<SearchResponse> {
        let query = request.query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::InvalidRequest("Query must not be empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::InvalidRequest(format!(
                "Query exceeds {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::InvalidRequest(format!(
                "Limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let filters = request.filters.unwrap_or_default();

        info!(query = %query, limit, "Search started");

        let (web_results, papers) = tokio::join!(
            self.web.search(&query, STARTUP_RESULTS_CAP),
            self.database_path(&query, &filters, limit),
        );
        let papers = papers?;

        let startups: Vec<RankedDocument> = web_results
            .into_iter()
            .take(STARTUP_RESULTS_CAP)
            .map(web_result_to_document)
            .collect();

        let total = startups.len() + papers.len();
        info!(startups = startups.len(), papers = papers.len(), "Search completed");

        Ok(SearchResponse {
            startups,
            papers,
            query,
            total,
        })
    }

    /// Hybrid retrieve → rerank → highlight.
    async fn database_path(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> AppResult<Vec<RankedDocument>> {
        let outcome = self.retriever.search(query, filters, RETRIEVAL_TOP_K).await;

        if outcome.unavailable() {
            warn!("Retrieval unavailable, returning empty database results");
            return Ok(Vec::new());
        }

        let top_n = limit.min(MAX_RERANK_TOP_N);
        let mut ranked = self.reranker.rerank(query, outcome.candidates, top_n).await;
        self.highlighter.apply(query, &mut ranked).await;

        Ok(ranked)
    }

    /// Summarize already-hydrated documents (one batched model call).
    pub async fn summarize(
        &self,
        documents: &[SummaryInput],
    ) -> AppResult<HashMap<String, SummarySection>> {
        self.summarizer.summarize(documents).await
    }
}

fn web_result_to_document(result: WebResult) -> RankedDocument {
    RankedDocument {
        doc_id: result.url.clone(),
        source: Source::Startups,
        score: result.score,
        rerank_score: None,
        title: result.title,
        snippet: result.snippet,
        metadata: json!({
            "url": result.url,
            "published_date": result.published_date,
        }),
        highlights: Vec::new(),
    }
}
