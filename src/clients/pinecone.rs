//! Pinecone client for dense vector search over document chunks.
//!
//! Queries embed the query text first (e5 `query:` prefix) and search the
//! chunk index; matches carry the owning document's id and display metadata.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::clients::{EmbeddingModel, VectorIndexer, VectorRecord, VectorSearch};
use crate::config::PineconeConfig;
use crate::types::{AppError, AppResult, RetrievalCandidate, SearchFilters, Source};
use crate::utils::truncate_chars;

const UPSERT_BATCH_SIZE: usize = 100;
const SNIPPET_CHARS: usize = 300;

pub struct PineconeClient {
    http: reqwest::Client,
    index_host: String,
    api_key: String,
    embedder: Arc<dyn EmbeddingModel>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Value,
}

impl PineconeClient {
    pub fn new(config: &PineconeConfig, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            http: reqwest::Client::new(),
            index_host: config.index_host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            embedder,
        }
    }

    fn build_filter(filters: &SearchFilters) -> Option<Value> {
        let mut clauses = serde_json::Map::new();
        if let Some(sources) = &filters.source {
            let names: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
            clauses.insert("source".into(), json!({ "$in": names }));
        }
        if let Some(year) = filters.year_gte {
            clauses.insert("year".into(), json!({ "$gte": year }));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(Value::Object(clauses))
        }
    }

    fn candidate_from_match(m: Match) -> RetrievalCandidate {
        let meta = &m.metadata;
        let str_field = |key: &str| {
            meta.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let source = match str_field("source").as_str() {
            "startups" => Source::Startups,
            _ => Source::Papers,
        };

        RetrievalCandidate {
            doc_id: str_field("doc_id"),
            source,
            score: m.score,
            title: str_field("title"),
            snippet: truncate_chars(&str_field("text"), SNIPPET_CHARS),
            metadata: json!({
                "year": meta.get("year"),
                "section": meta.get("section"),
                "chunk_id": m.id,
            }),
        }
    }
}

#[async_trait]
impl VectorSearch for PineconeClient {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalCandidate>> {
        let vector = self.embedder.embed_query(query).await?;

        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(filter) = Self::build_filter(filters) {
            body["filter"] = filter;
        }

        let url = format!("{}/query", self.index_host);
        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Pinecone query failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Pinecone error status: {}", e)))?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Pinecone parse error: {}", e)))?;

        info!(count = parsed.matches.len(), "Vector search completed");

        Ok(parsed
            .matches
            .into_iter()
            .map(Self::candidate_from_match)
            .collect())
    }
}

#[async_trait]
impl VectorIndexer for PineconeClient {
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
        let mut total = 0usize;

        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let vectors: Vec<Value> = batch
                .iter()
                .map(|r| {
                    let metadata: HashMap<&String, &Value> = r.metadata.iter().collect();
                    json!({
                        "id": r.id,
                        "values": r.values,
                        "metadata": metadata,
                    })
                })
                .collect();

            let url = format!("{}/vectors/upsert", self.index_host);
            self.http
                .post(&url)
                .header("Api-Key", &self.api_key)
                .json(&json!({ "vectors": vectors }))
                .send()
                .await
                .map_err(|e| AppError::Upstream(format!("Pinecone upsert failed: {}", e)))?
                .error_for_status()
                .map_err(|e| AppError::Upstream(format!("Pinecone upsert status: {}", e)))?;

            total += batch.len();
            debug!(total, "Upserted vector batch");
        }

        info!(total, "Vector upsert completed");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_built_from_search_filters() {
        let filters = SearchFilters {
            source: Some(vec![Source::Papers]),
            year_gte: Some(2021),
        };
        let filter = PineconeClient::build_filter(&filters).unwrap();
        assert_eq!(filter["source"]["$in"][0], "papers");
        assert_eq!(filter["year"]["$gte"], 2021);

        assert!(PineconeClient::build_filter(&SearchFilters::default()).is_none());
    }

    #[test]
    fn test_ingested_metadata_round_trips_into_candidate() {
        // Whatever the indexing path writes, the query path must read back:
        // a match over an ingested chunk carries its text and section.
        let document = crate::models::Document {
            id: uuid::Uuid::new_v4(),
            source: "papers".to_string(),
            external_id: "arxiv:1234".to_string(),
            title: "Solid-state batteries".to_string(),
            body: "A study of electrolytes.".to_string(),
            year: Some(2023),
            metadata: json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let pieces = vec![crate::search::chunking::ChunkPiece {
            chunk_index: 0,
            text: "A study of electrolytes.".to_string(),
            section: "abstract".to_string(),
        }];

        let records =
            crate::search::ingest::vector_records_for(&document, &pieces, vec![vec![0.5]])
                .unwrap();
        let metadata = serde_json::to_value(&records[0].metadata).unwrap();

        let candidate = PineconeClient::candidate_from_match(Match {
            id: records[0].id.clone(),
            score: 0.91,
            metadata,
        });

        assert_eq!(candidate.doc_id, document.id.to_string());
        assert_eq!(candidate.source, Source::Papers);
        assert_eq!(candidate.snippet, "A study of electrolytes.");
        assert_eq!(candidate.metadata["section"], "abstract");
        assert_eq!(candidate.year(), Some(2023));
    }

    #[test]
    fn test_candidate_from_match() {
        let candidate = PineconeClient::candidate_from_match(Match {
            id: "d1:0".into(),
            score: 0.87,
            metadata: json!({
                "doc_id": "d1",
                "source": "startups",
                "title": "VoltCo",
                "text": "Batteries for drones.",
                "year": 2022,
                "section": "description",
            }),
        });

        assert_eq!(candidate.doc_id, "d1");
        assert_eq!(candidate.source, Source::Startups);
        assert_eq!(candidate.snippet, "Batteries for drones.");
        assert_eq!(candidate.metadata["chunk_id"], "d1:0");
    }
}
