// Type definitions shared across the retrieval pipeline

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Which corpus a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Papers,
    Startups,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Papers => write!(f, "papers"),
            Source::Startups => write!(f, "startups"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "papers" => Ok(Source::Papers),
            "startups" => Ok(Source::Startups),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}

/// Optional constraints applied to the database retrieval path.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_gte: Option<i32>,
}

impl SearchFilters {
    /// Whether a candidate from `source` with `year` survives these filters.
    pub fn matches(&self, source: Source, year: Option<i32>) -> bool {
        if let Some(sources) = &self.source {
            if !sources.contains(&source) {
                return false;
            }
        }
        if let Some(min_year) = self.year_gte {
            match year {
                Some(y) if y >= min_year => {}
                _ => return false,
            }
        }
        true
    }
}

/// One candidate as returned by a single retrieval source.
///
/// Scores are source-specific (BM25 vs cosine) and are only comparable after
/// normalization inside the hybrid retriever.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetrievalCandidate {
    pub doc_id: String,
    pub source: Source,
    pub score: f32,
    pub title: String,
    pub snippet: String,
    pub metadata: serde_json::Value,
}

impl RetrievalCandidate {
    /// Publication year, when the source carried one in its metadata.
    pub fn year(&self) -> Option<i32> {
        self.metadata
            .get("year")
            .and_then(|v| v.as_i64())
            .map(|y| y as i32)
    }
}

/// Terminal per-result representation returned to callers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RankedDocument {
    pub doc_id: String,
    pub source: Source,
    /// Fused retrieval score (or the web-search score for startups).
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    pub title: String,
    pub snippet: String,
    pub metadata: serde_json::Value,
    pub highlights: Vec<String>,
}

impl RankedDocument {
    pub fn from_candidate(candidate: RetrievalCandidate) -> Self {
        Self {
            doc_id: candidate.doc_id,
            source: candidate.source,
            score: candidate.score,
            rerank_score: None,
            title: candidate.title,
            snippet: candidate.snippet,
            metadata: candidate.metadata,
            highlights: Vec::new(),
        }
    }
}

/// A single live web-search result (startup discovery channel).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub snippet: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Fixed 5-field structured summary for one document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummarySection {
    pub problem: String,
    pub approach: String,
    pub evidence_or_signals: String,
    pub result: String,
    pub limitations: String,
}

/// Input to the summarization model: an already-hydrated document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SummaryInput {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: Source,
}

/// Summary model output before the 5 fields are guaranteed present.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RawSummary {
    pub problem: Option<String>,
    pub approach: Option<String>,
    pub evidence_or_signals: Option<String>,
    pub result: Option<String>,
    pub limitations: Option<String>,
}

pub type SummaryMap = HashMap<String, RawSummary>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_match_source_subset() {
        let filters = SearchFilters {
            source: Some(vec![Source::Papers]),
            year_gte: None,
        };
        assert!(filters.matches(Source::Papers, None));
        assert!(!filters.matches(Source::Startups, Some(2024)));
    }

    #[test]
    fn filters_require_year_when_set() {
        let filters = SearchFilters {
            source: None,
            year_gte: Some(2020),
        };
        assert!(filters.matches(Source::Papers, Some(2021)));
        assert!(!filters.matches(Source::Papers, Some(2019)));
        // Unknown year cannot satisfy a minimum-year constraint.
        assert!(!filters.matches(Source::Papers, None));
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Papers).unwrap(), "\"papers\"");
        let parsed: Source = serde_json::from_str("\"startups\"").unwrap();
        assert_eq!(parsed, Source::Startups);
    }
}
