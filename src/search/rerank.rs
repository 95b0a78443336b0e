//! Second-pass reordering of the fused candidate list.
//!
//! The cross-encoder service scores each candidate against the query; when it
//! is unavailable the fused ordering is already a reasonable relevance proxy,
//! so the fallback silently returns the first `top_n` candidates unchanged.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::RerankModel;
use crate::types::{RankedDocument, RetrievalCandidate};

/// Upper bound on the reranked prefix.
pub const MAX_RERANK_TOP_N: usize = 30;

pub struct Reranker {
    model: Arc<dyn RerankModel>,
}

impl Reranker {
    pub fn new(model: Arc<dyn RerankModel>) -> Self {
        Self { model }
    }

    /// Reorder `candidates` by cross-encoder relevance and truncate to
    /// `top_n`. Every other candidate field is preserved; only `rerank_score`
    /// is added.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalCandidate>,
        top_n: usize,
    ) -> Vec<RankedDocument> {
        if candidates.is_empty() {
            return Vec::new();
        }

        match self.model.rerank(query, &candidates, top_n).await {
            Ok(mut scored) => {
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(top_n);

                info!(input = candidates.len(), output = scored.len(), "Reranked candidates");

                let mut slots: Vec<Option<RetrievalCandidate>> =
                    candidates.into_iter().map(Some).collect();

                scored
                    .into_iter()
                    .filter_map(|(index, score)| {
                        let candidate = slots.get_mut(index)?.take()?;
                        let mut doc = RankedDocument::from_candidate(candidate);
                        doc.rerank_score = Some(score);
                        Some(doc)
                    })
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Reranking failed, falling back to fused order");
                candidates
                    .into_iter()
                    .take(top_n)
                    .map(RankedDocument::from_candidate)
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::types::{AppError, AppResult, Source};

    fn candidate(doc_id: &str, score: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            doc_id: doc_id.to_string(),
            source: Source::Papers,
            score,
            title: format!("title-{}", doc_id),
            snippet: format!("snippet-{}", doc_id),
            metadata: json!({}),
        }
    }

    struct FakeRerank(Vec<(usize, f32)>);
    struct FailingRerank;

    #[async_trait]
    impl RerankModel for FakeRerank {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[RetrievalCandidate],
            _top_n: usize,
        ) -> AppResult<Vec<(usize, f32)>> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl RerankModel for FailingRerank {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[RetrievalCandidate],
            _top_n: usize,
        ) -> AppResult<Vec<(usize, f32)>> {
            Err(AppError::Upstream("cohere down".into()))
        }
    }

    #[tokio::test]
    async fn test_failure_returns_first_top_n_unchanged() {
        let reranker = Reranker::new(Arc::new(FailingRerank));
        let candidates: Vec<RetrievalCandidate> =
            ["a", "b", "c", "d", "e"].iter().enumerate()
                .map(|(i, id)| candidate(id, 1.0 - i as f32 * 0.1))
                .collect();

        let ranked = reranker.rerank("q", candidates, 3).await;

        let ids: Vec<&str> = ranked.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(ranked.iter().all(|d| d.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_reorders_by_model_score() {
        let reranker = Reranker::new(Arc::new(FakeRerank(vec![
            (2, 0.95),
            (0, 0.60),
            (1, 0.10),
        ])));
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7)];

        let ranked = reranker.rerank("q", candidates, 2).await;

        let ids: Vec<&str> = ranked.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(ranked[0].rerank_score, Some(0.95));
        // Fused score untouched by reranking.
        assert!((ranked[0].score - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let reranker = Reranker::new(Arc::new(FailingRerank));
        assert!(reranker.rerank("q", Vec::new(), 5).await.is_empty());
    }
}
