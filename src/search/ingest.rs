//! Indexing path: persist submitted documents, chunk and embed them, and
//! push the results to the lexical and vector indexes.
//!
//! Each run is recorded in `ingestion_runs`. A failure on one document is
//! recorded and skipped; the run continues with the rest.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, info};

use crate::clients::{
    EmbeddingModel, LexicalDocument, LexicalIndexer, VectorIndexer, VectorRecord,
};
use crate::db::DatabaseOperations;
use crate::models::{Document, IndexDocument, IndexResponse};
use crate::search::chunking::{chunk_text, ChunkPiece};
use crate::types::{AppError, AppResult, Source};
use crate::utils::{truncate_chars, with_retry};

/// Chunk text length stored in vector metadata, matching what the vector
/// search path reads back as the candidate snippet.
const VECTOR_TEXT_CHARS: usize = 300;

const INDEX_RETRIES: u32 = 3;

pub struct Ingestor {
    pool: PgPool,
    lexical: Arc<dyn LexicalIndexer>,
    vector: Arc<dyn VectorIndexer>,
    embeddings: Arc<dyn EmbeddingModel>,
}

impl Ingestor {
    pub fn new(
        pool: PgPool,
        lexical: Arc<dyn LexicalIndexer>,
        vector: Arc<dyn VectorIndexer>,
        embeddings: Arc<dyn EmbeddingModel>,
    ) -> Self {
        Self {
            pool,
            lexical,
            vector,
            embeddings,
        }
    }

    /// Ingest a batch of already-fetched external records for one source.
    pub async fn ingest(
        &self,
        source: Source,
        documents: Vec<IndexDocument>,
    ) -> AppResult<IndexResponse> {
        let run = DatabaseOperations::create_ingestion_run(&self.pool, source)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        info!(run_id = %run.id, %source, documents = documents.len(), "Ingestion started");

        let total_fetched = documents.len();
        let mut errors: Vec<String> = Vec::new();
        let mut failed_docs = 0usize;
        let mut lexical_docs: Vec<LexicalDocument> = Vec::new();
        let mut vector_records: Vec<VectorRecord> = Vec::new();
        let mut processed = 0usize;

        for doc in documents {
            let external_id = doc.external_id.clone();
            match self.process_document(source, doc).await {
                Ok((lexical_doc, records)) => {
                    lexical_docs.push(lexical_doc);
                    vector_records.extend(records);
                    processed += 1;
                }
                Err(e) => {
                    error!(%external_id, error = %e, "Document ingestion failed");
                    errors.push(format!("{}: {}", external_id, e));
                    failed_docs += 1;
                }
            }
        }

        let mut indexed = 0usize;

        if !lexical_docs.is_empty() {
            let lexical = Arc::clone(&self.lexical);
            let docs = lexical_docs.clone();
            match with_retry(
                move || {
                    let lexical = Arc::clone(&lexical);
                    let docs = docs.clone();
                    Box::pin(async move { lexical.bulk_index(source, &docs).await })
                },
                INDEX_RETRIES,
            )
            .await
            {
                Ok(outcome) => {
                    indexed = outcome.indexed;
                    failed_docs += outcome.errors;
                }
                Err(e) => {
                    errors.push(format!("lexical index: {}", e));
                    failed_docs += lexical_docs.len();
                }
            }
        }

        if !vector_records.is_empty() {
            let vector = Arc::clone(&self.vector);
            let records = vector_records.clone();
            if let Err(e) = with_retry(
                move || {
                    let vector = Arc::clone(&vector);
                    let records = records.clone();
                    Box::pin(async move { vector.upsert(&records).await })
                },
                INDEX_RETRIES,
            )
            .await
            {
                errors.push(format!("vector index: {}", e));
            }
        }

        let status = if errors.is_empty() && failed_docs == 0 {
            "completed"
        } else if indexed > 0 || processed > 0 {
            "completed_with_errors"
        } else {
            "failed"
        };

        DatabaseOperations::complete_ingestion_run(
            &self.pool,
            run.id,
            status,
            total_fetched as i32,
            processed as i32,
            indexed as i32,
            &errors,
        )
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

        info!(run_id = %run.id, status, indexed, errors = errors.len(), "Ingestion finished");

        Ok(IndexResponse {
            run_id: run.id,
            indexed,
            errors: failed_docs,
        })
    }

    /// Persist one document, chunk its text, and embed the chunks.
    async fn process_document(
        &self,
        source: Source,
        doc: IndexDocument,
    ) -> AppResult<(LexicalDocument, Vec<VectorRecord>)> {
        let stored = DatabaseOperations::upsert_document(
            &self.pool,
            source,
            &doc.external_id,
            &doc.title,
            &doc.text,
            doc.year,
            &doc.metadata,
        )
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

        let section = match source {
            Source::Papers => "abstract",
            Source::Startups => "description",
        };
        let pieces = chunk_text(&doc.text, section);
        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();

        let records = if texts.is_empty() {
            Vec::new()
        } else {
            let vectors = self.embeddings.embed_passages(&texts).await?;
            vector_records_for(&stored, &pieces, vectors)?
        };

        let rows: Vec<(String, Option<String>, Option<String>)> = pieces
            .iter()
            .map(|p| {
                (
                    p.text.clone(),
                    Some(p.section.clone()),
                    Some(vector_id(stored.id, p.chunk_index)),
                )
            })
            .collect();
        DatabaseOperations::replace_chunks(&self.pool, stored.id, &rows)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let lexical_doc = LexicalDocument {
            doc_id: stored.id.to_string(),
            external_id: stored.external_id.clone(),
            title: stored.title.clone(),
            text: stored.body.clone(),
            year: stored.year,
            metadata: stored.metadata.clone(),
        };

        Ok((lexical_doc, records))
    }
}

fn vector_id(document_id: uuid::Uuid, chunk_index: usize) -> String {
    format!("{}:{}", document_id, chunk_index)
}

/// Pair chunk pieces with their embeddings and attach retrieval metadata.
///
/// The keys written here (`doc_id`, `source`, `title`, `text`, `section`,
/// `year`) are exactly what the vector search path reads back when mapping a
/// match to a retrieval candidate.
pub(crate) fn vector_records_for(
    document: &Document,
    pieces: &[ChunkPiece],
    vectors: Vec<Vec<f32>>,
) -> AppResult<Vec<VectorRecord>> {
    if vectors.len() != pieces.len() {
        return Err(AppError::Upstream(format!(
            "Embedding count mismatch: {} chunks, {} vectors",
            pieces.len(),
            vectors.len()
        )));
    }

    let records = pieces
        .iter()
        .zip(vectors)
        .map(|(piece, values)| {
            let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
            metadata.insert("doc_id".into(), serde_json::json!(document.id.to_string()));
            metadata.insert("source".into(), serde_json::json!(document.source));
            metadata.insert("title".into(), serde_json::json!(document.title));
            metadata.insert("section".into(), serde_json::json!(piece.section));
            metadata.insert(
                "text".into(),
                serde_json::json!(truncate_chars(&piece.text, VECTOR_TEXT_CHARS)),
            );
            if let Some(year) = document.year {
                metadata.insert("year".into(), serde_json::json!(year));
            }

            VectorRecord {
                id: vector_id(document.id, piece.chunk_index),
                values,
                metadata,
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn document(year: Option<i32>) -> Document {
        Document {
            id: Uuid::new_v4(),
            source: "papers".to_string(),
            external_id: "arxiv:1234".to_string(),
            title: "A title".to_string(),
            body: "Body text.".to_string(),
            year,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn piece(index: usize, text: &str) -> ChunkPiece {
        ChunkPiece {
            chunk_index: index,
            text: text.to_string(),
            section: "abstract".to_string(),
        }
    }

    #[test]
    fn test_vector_ids_are_doc_scoped() {
        let doc = document(Some(2024));
        let pieces = vec![piece(0, "First."), piece(1, "Second.")];
        let vectors = vec![vec![0.1], vec![0.2]];

        let records = vector_records_for(&doc, &pieces, vectors).unwrap();
        assert_eq!(records[0].id, format!("{}:0", doc.id));
        assert_eq!(records[1].id, format!("{}:1", doc.id));
    }

    #[test]
    fn test_record_metadata_carries_retrieval_fields() {
        let doc = document(Some(2021));
        let records =
            vector_records_for(&doc, &[piece(0, "Chunk text.")], vec![vec![0.5]]).unwrap();

        let metadata = &records[0].metadata;
        assert_eq!(metadata["doc_id"], serde_json::json!(doc.id.to_string()));
        assert_eq!(metadata["source"], serde_json::json!("papers"));
        assert_eq!(metadata["year"], serde_json::json!(2021));
        assert_eq!(metadata["text"], serde_json::json!("Chunk text."));
        assert_eq!(metadata["section"], serde_json::json!("abstract"));
    }

    #[test]
    fn test_year_omitted_when_unknown() {
        let doc = document(None);
        let records = vector_records_for(&doc, &[piece(0, "Text.")], vec![vec![0.5]]).unwrap();
        assert!(!records[0].metadata.contains_key("year"));
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let doc = document(None);
        let err = vector_records_for(&doc, &[piece(0, "Text.")], vec![]).unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
