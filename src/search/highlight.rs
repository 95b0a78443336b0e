//! "Why this result" highlight generation.
//!
//! Each final result gets up to [`MAX_HIGHLIGHTS`] short fragments from the
//! highlight model. Failures fall back to the leading sentences of the text
//! (trailing terminators trimmed), so the field is never empty for non-empty
//! source text. Results are processed concurrently and independently; one
//! slow or failing call degrades only its own result.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::clients::HighlightModel;
use crate::types::RankedDocument;
use crate::utils::split_sentences;

pub const MAX_HIGHLIGHTS: usize = 3;

/// Concurrency bound for the per-result highlight fan-out.
const HIGHLIGHT_CONCURRENCY: usize = 8;

pub struct Highlighter {
    model: Arc<dyn HighlightModel>,
}

impl Highlighter {
    pub fn new(model: Arc<dyn HighlightModel>) -> Self {
        Self { model }
    }

    /// Attach highlights to every result in place.
    ///
    /// Each future owns its model handle, query and text so the batch stays
    /// `Send` across await points.
    pub async fn apply(&self, query: &str, results: &mut [RankedDocument]) {
        let tasks: Vec<_> = results
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let model = Arc::clone(&self.model);
                let query = query.to_string();
                let text = doc.snippet.clone();
                async move { (i, generate(model, &query, &text).await) }
            })
            .collect();

        let generated: Vec<(usize, Vec<String>)> = stream::iter(tasks)
            .buffer_unordered(HIGHLIGHT_CONCURRENCY)
            .collect()
            .await;

        for (i, highlights) in generated {
            results[i].highlights = highlights;
        }
    }

    /// Highlights for a single result's text, with deterministic fallback.
    pub async fn for_text(&self, query: &str, text: &str) -> Vec<String> {
        generate(Arc::clone(&self.model), query, text).await
    }
}

async fn generate(model: Arc<dyn HighlightModel>, query: &str, text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    match model.highlights(query, text).await {
        Ok(highlights) if !highlights.is_empty() => {
            highlights.into_iter().take(MAX_HIGHLIGHTS).collect()
        }
        Ok(_) => fallback_highlights(text),
        Err(e) => {
            warn!(error = %e, "Highlight generation failed, using sentence fallback");
            fallback_highlights(text)
        }
    }
}

/// First [`MAX_HIGHLIGHTS`] sentences of the text, terminators trimmed.
pub fn fallback_highlights(text: &str) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .take(MAX_HIGHLIGHTS)
        .map(|sentence| {
            sentence
                .trim_end_matches(['.', '!', '?'])
                .trim_end()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::types::{AppError, AppResult, RankedDocument, Source};

    struct FakeHighlight(Vec<String>);
    struct FailingHighlight;

    #[async_trait]
    impl HighlightModel for FakeHighlight {
        async fn highlights(&self, _query: &str, _text: &str) -> AppResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl HighlightModel for FailingHighlight {
        async fn highlights(&self, _query: &str, _text: &str) -> AppResult<Vec<String>> {
            Err(AppError::Upstream("model down".into()))
        }
    }

    fn doc(id: &str, snippet: &str) -> RankedDocument {
        RankedDocument {
            doc_id: id.to_string(),
            source: Source::Papers,
            score: 1.0,
            rerank_score: None,
            title: id.to_string(),
            snippet: snippet.to_string(),
            metadata: json!({}),
            highlights: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_fallback_returns_first_three_sentences_trimmed() {
        let highlighter = Highlighter::new(Arc::new(FailingHighlight));
        let highlights = highlighter
            .for_text(
                "q",
                "Sentence one. Sentence two. Sentence three. Sentence four.",
            )
            .await;

        assert_eq!(
            highlights,
            vec!["Sentence one", "Sentence two", "Sentence three"]
        );
    }

    #[tokio::test]
    async fn test_nonempty_text_never_yields_empty_highlights() {
        let highlighter = Highlighter::new(Arc::new(FailingHighlight));
        let highlights = highlighter.for_text("q", "No terminator here").await;
        assert_eq!(highlights, vec!["No terminator here"]);
    }

    #[tokio::test]
    async fn test_empty_text_yields_no_highlights() {
        let highlighter = Highlighter::new(Arc::new(FailingHighlight));
        assert!(highlighter.for_text("q", "   ").await.is_empty());
    }

    #[tokio::test]
    async fn test_model_output_is_capped() {
        let highlighter = Highlighter::new(Arc::new(FakeHighlight(vec![
            "one".into(),
            "two".into(),
            "three".into(),
            "four".into(),
        ])));
        let highlights = highlighter.for_text("q", "Some text.").await;
        assert_eq!(highlights.len(), MAX_HIGHLIGHTS);
    }

    #[tokio::test]
    async fn test_apply_is_usable_from_spawned_tasks() {
        // Axum handlers require the whole search future to be Send; keep the
        // highlight batch future Send by construction.
        fn assert_send<T: Send>(value: T) -> T {
            value
        }

        let highlighter = Highlighter::new(Arc::new(FailingHighlight));
        let mut results = vec![doc("a", "Only sentence.")];
        assert_send(highlighter.apply("q", &mut results)).await;
        assert_eq!(results[0].highlights, vec!["Only sentence"]);
    }

    #[tokio::test]
    async fn test_apply_assigns_per_result_independently() {
        let highlighter = Highlighter::new(Arc::new(FailingHighlight));
        let mut results = vec![
            doc("a", "Alpha first. Alpha second."),
            doc("b", "Beta only"),
        ];

        highlighter.apply("q", &mut results).await;

        assert_eq!(results[0].highlights, vec!["Alpha first", "Alpha second"]);
        assert_eq!(results[1].highlights, vec!["Beta only"]);
    }
}
