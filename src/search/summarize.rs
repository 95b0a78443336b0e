//! Batched 5-field structured summarization.
//!
//! All requested documents go to the model in a single call. Unlike the
//! rerank and highlight paths there is no sensible degraded output for a
//! structured summary, so model failures propagate to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::clients::SummaryModel;
use crate::types::{AppError, AppResult, RawSummary, SummaryInput, SummarySection};

/// Upper bound on documents per summarize call.
pub const MAX_SUMMARY_DOCS: usize = 10;

pub struct Summarizer {
    model: Arc<dyn SummaryModel>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn SummaryModel>) -> Self {
        Self { model }
    }

    /// Summarize already-hydrated documents. Ids the model did not cover are
    /// absent from the result; sections the model skipped are filled with a
    /// placeholder so every returned summary has all five fields.
    pub async fn summarize(
        &self,
        documents: &[SummaryInput],
    ) -> AppResult<HashMap<String, SummarySection>> {
        if documents.is_empty() {
            return Err(AppError::NotFound("No documents to summarize".to_string()));
        }
        if documents.len() > MAX_SUMMARY_DOCS {
            return Err(AppError::InvalidRequest(format!(
                "At most {} documents per summarize call",
                MAX_SUMMARY_DOCS
            )));
        }

        let raw = self.model.summarize(documents).await?;

        let requested: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let summaries: HashMap<String, SummarySection> = raw
            .into_iter()
            .filter(|(id, _)| requested.contains(&id.as_str()))
            .map(|(id, raw)| (id, finalize(raw)))
            .collect();

        info!(
            requested = documents.len(),
            summarized = summaries.len(),
            "Summarization completed"
        );
        Ok(summaries)
    }
}

fn finalize(raw: RawSummary) -> SummarySection {
    let fill = |value: Option<String>, key: &str| {
        value.unwrap_or_else(|| format!("No {} information available", key))
    };

    SummarySection {
        problem: fill(raw.problem, "problem"),
        approach: fill(raw.approach, "approach"),
        evidence_or_signals: fill(raw.evidence_or_signals, "evidence_or_signals"),
        result: fill(raw.result, "result"),
        limitations: fill(raw.limitations, "limitations"),
    }
}
