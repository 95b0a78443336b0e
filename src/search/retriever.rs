//! Hybrid retrieval combining BM25 and vector search.
//!
//! Raw BM25 and cosine scores live on different scales, so each source's
//! scores are min-max normalized within its own result set before the
//! weighted blend. Request filters are applied after fusion so they never
//! distort the normalization basis.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::{LexicalSearch, VectorSearch};
use crate::types::{RetrievalCandidate, SearchFilters};

/// Hybrid blending weights (sum to 1).
pub const LEXICAL_WEIGHT: f32 = 0.6;
pub const VECTOR_WEIGHT: f32 = 0.4;

/// Per-source candidate cap, bounding tail latency.
pub const PER_SOURCE_CAP: usize = 200;

/// Fused retrieval result with source-degradation visible to the caller.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub candidates: Vec<RetrievalCandidate>,
    pub lexical_degraded: bool,
    pub vector_degraded: bool,
}

impl RetrievalOutcome {
    /// Both sources failed; the orchestrator treats this as
    /// retrieval-unavailable rather than an empty corpus.
    pub fn unavailable(&self) -> bool {
        self.lexical_degraded && self.vector_degraded
    }
}

pub struct HybridRetriever {
    lexical: Arc<dyn LexicalSearch>,
    vector: Arc<dyn VectorSearch>,
}

impl HybridRetriever {
    pub fn new(lexical: Arc<dyn LexicalSearch>, vector: Arc<dyn VectorSearch>) -> Self {
        Self { lexical, vector }
    }

    /// Run both sources concurrently, fuse, dedupe, post-filter and cap.
    ///
    /// A failing source degrades to single-source ranking instead of failing
    /// the retrieval; both failing yields an empty outcome with both flags set.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> RetrievalOutcome {
        let per_source = top_k.min(PER_SOURCE_CAP);

        // Sources are queried unfiltered; filters are applied post-fusion so
        // normalization always runs over the full per-source result set.
        let unfiltered = SearchFilters::default();
        let (lexical, vector) = futures::join!(
            self.lexical.search(query, &unfiltered, per_source),
            self.vector.search(query, &unfiltered, per_source),
        );

        let (lexical_results, lexical_degraded) = match lexical {
            Ok(results) => (results, false),
            Err(e) => {
                warn!(error = %e, "Lexical search failed, degrading to vector-only");
                (Vec::new(), true)
            }
        };
        let (vector_results, vector_degraded) = match vector {
            Ok(results) => (results, false),
            Err(e) => {
                warn!(error = %e, "Vector search failed, degrading to lexical-only");
                (Vec::new(), true)
            }
        };

        if lexical_degraded && vector_degraded {
            warn!("Both retrieval sources failed");
            return RetrievalOutcome {
                candidates: Vec::new(),
                lexical_degraded,
                vector_degraded,
            };
        }

        let lexical_count = lexical_results.len();
        let vector_count = vector_results.len();

        let mut candidates = fuse_and_dedupe(lexical_results, vector_results);
        candidates.retain(|c| filters.matches(c.source, c.year()));
        candidates.truncate(top_k);

        info!(
            lexical = lexical_count,
            vector = vector_count,
            fused = candidates.len(),
            "Blended retrieval sources into unique documents"
        );

        RetrievalOutcome {
            candidates,
            lexical_degraded,
            vector_degraded,
        }
    }
}

/// Min-max normalize the scores of one source's result set.
///
/// A constant-score (or single-result) set normalizes to all 1.0.
fn normalized_scores(results: &[RetrievalCandidate]) -> Vec<f32> {
    if results.is_empty() {
        return Vec::new();
    }

    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|r| r.score)
        .fold(f32::NEG_INFINITY, f32::max);

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; results.len()];
    }

    results
        .iter()
        .map(|r| (r.score - min) / (max - min))
        .collect()
}

/// Blend normalized lexical and vector results into one deduplicated list.
///
/// `fused = 0.6 * lexical + 0.4 * vector`; a document seen by only one source
/// keeps that source's weighted score with zero contribution from the other.
/// When both sources carry a document the lexical candidate's title, snippet
/// and metadata win (its snippet comes from the stored abstract rather than an
/// arbitrary chunk). A document surfacing several times within one source
/// (multiple chunks of it matching) contributes its best normalized score.
/// The final sort is stable, so equal fused scores preserve arrival order.
fn fuse_and_dedupe(
    lexical: Vec<RetrievalCandidate>,
    vector: Vec<RetrievalCandidate>,
) -> Vec<RetrievalCandidate> {
    struct Entry {
        candidate: RetrievalCandidate,
        lexical_score: f32,
        vector_score: f32,
    }

    let lexical_norm = normalized_scores(&lexical);
    let vector_norm = normalized_scores(&vector);

    let mut entries: Vec<Entry> = Vec::new();
    let mut by_doc: HashMap<String, usize> = HashMap::new();

    for (candidate, norm) in lexical.into_iter().zip(lexical_norm) {
        match by_doc.get(&candidate.doc_id) {
            Some(&i) => {
                let entry = &mut entries[i];
                entry.lexical_score = entry.lexical_score.max(norm);
            }
            None => {
                by_doc.insert(candidate.doc_id.clone(), entries.len());
                entries.push(Entry {
                    candidate,
                    lexical_score: norm,
                    vector_score: 0.0,
                });
            }
        }
    }

    for (candidate, norm) in vector.into_iter().zip(vector_norm) {
        match by_doc.get(&candidate.doc_id) {
            Some(&i) => {
                // Keep the existing candidate's fields; lexical metadata wins.
                let entry = &mut entries[i];
                entry.vector_score = entry.vector_score.max(norm);
            }
            None => {
                by_doc.insert(candidate.doc_id.clone(), entries.len());
                entries.push(Entry {
                    candidate,
                    lexical_score: 0.0,
                    vector_score: norm,
                });
            }
        }
    }

    let mut fused: Vec<RetrievalCandidate> = entries
        .into_iter()
        .map(|entry| {
            let mut candidate = entry.candidate;
            candidate.score =
                LEXICAL_WEIGHT * entry.lexical_score + VECTOR_WEIGHT * entry.vector_score;
            candidate
        })
        .collect();

    // Vec::sort_by is stable: ties keep source-arrival order.
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    fused
}
