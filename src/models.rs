use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use validator::Validate;

use crate::config::Config;
use crate::search::ingest::Ingestor;
use crate::search::pipeline::SearchPipeline;
use crate::types::{RankedDocument, Source, SearchFilters, SummarySection};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub pipeline: Arc<SearchPipeline>,
    pub ingestor: Arc<Ingestor>,
}

// Persistent models
// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

/// A paper or startup profile as stored in Postgres.
///
/// `(source, external_id)` is unique so re-ingesting the same external record
/// updates in place instead of creating a duplicate.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: uuid::Uuid,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub year: Option<i32>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A bounded slice of a document's text used for dense retrieval.
///
/// Chunk ordinals are contiguous from 0 within a document; chunks are deleted
/// and recreated wholesale when the owning document is re-chunked, so a
/// `vector_id` is never reassigned to a different chunk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Chunk {
    pub id: uuid::Uuid,
    pub document_id: uuid::Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub section: Option<String>,
    pub vector_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Bookkeeping record of one ingestion job.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct IngestionRun {
    pub id: uuid::Uuid,
    pub source: String,
    pub status: String,
    pub total_fetched: i32,
    pub total_processed: i32,
    pub total_indexed: i32,
    pub error_count: i32,
    pub errors: serde_json::Value,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

// Request / response models

// Query and limit bounds are enforced by the pipeline itself (after trimming),
// so this request carries no validator attributes.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub filters: Option<SearchFilters>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub startups: Vec<RankedDocument>,
    pub papers: Vec<RankedDocument>,
    pub query: String,
    pub total: usize,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct SummarizeRequest {
    #[validate(length(min = 1, max = 10))]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SummarizeResponse {
    pub summaries: HashMap<String, SummarySection>,
}

/// One already-fetched external record submitted for indexing.
// Serialize is required by the length validator on `IndexRequest::documents`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexDocument {
    pub external_id: String,
    pub title: String,
    pub text: String,
    pub year: Option<i32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct IndexRequest {
    pub source: Source,
    #[validate(length(min = 1, max = 500))]
    pub documents: Vec<IndexDocument>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexResponse {
    pub run_id: uuid::Uuid,
    pub indexed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn index_doc() -> IndexDocument {
        IndexDocument {
            external_id: "arxiv:1234".to_string(),
            title: "A title".to_string(),
            text: "Body text.".to_string(),
            year: Some(2024),
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_index_request_bounds() {
        let empty = IndexRequest {
            source: Source::Papers,
            documents: Vec::new(),
        };
        assert!(empty.validate().is_err());

        let ok = IndexRequest {
            source: Source::Papers,
            documents: vec![index_doc()],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_summarize_request_bounds() {
        let empty = SummarizeRequest { ids: Vec::new() };
        assert!(empty.validate().is_err());

        let over = SummarizeRequest {
            ids: (0..11).map(|i| format!("id-{}", i)).collect(),
        };
        assert!(over.validate().is_err());
    }
}
