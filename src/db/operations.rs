use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Chunk, Document, IngestionRun};
use crate::types::Source;

pub struct DatabaseOperations;

impl DatabaseOperations {
    // Document operations

    /// Fetch documents by id; unknown ids are simply absent from the result.
    pub async fn get_documents_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(docs)
    }

    /// Insert or update a document keyed by `(source, external_id)`.
    ///
    /// Re-ingesting the same external record updates the existing row.
    pub async fn upsert_document(
        pool: &PgPool,
        source: Source,
        external_id: &str,
        title: &str,
        body: &str,
        year: Option<i32>,
        metadata: &serde_json::Value,
    ) -> Result<Document> {
        let doc = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (source, external_id, title, body, year, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source, external_id) DO UPDATE SET
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                year = EXCLUDED.year,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(source.to_string())
        .bind(external_id)
        .bind(title)
        .bind(body)
        .bind(year)
        .bind(metadata)
        .fetch_one(pool)
        .await?;

        Ok(doc)
    }

    // Chunk operations

    /// Replace a document's chunks wholesale inside one transaction.
    ///
    /// Ordinals are assigned contiguously from 0 in input order, preserving
    /// the chunk invariants across re-chunking.
    pub async fn replace_chunks(
        pool: &PgPool,
        document_id: Uuid,
        chunks: &[(String, Option<String>, Option<String>)], // (text, section, vector_id)
    ) -> Result<Vec<Chunk>> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(chunks.len());
        for (index, (text, section, vector_id)) in chunks.iter().enumerate() {
            let chunk = sqlx::query_as::<_, Chunk>(
                r#"
                INSERT INTO chunks (document_id, chunk_index, text, section, vector_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(document_id)
            .bind(index as i32)
            .bind(text)
            .bind(section)
            .bind(vector_id)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(chunk);
        }

        tx.commit().await?;

        Ok(inserted)
    }

    // Ingestion run bookkeeping

    pub async fn create_ingestion_run(pool: &PgPool, source: Source) -> Result<IngestionRun> {
        let run = sqlx::query_as::<_, IngestionRun>(
            "INSERT INTO ingestion_runs (source, status) VALUES ($1, 'in_progress') RETURNING *",
        )
        .bind(source.to_string())
        .fetch_one(pool)
        .await?;

        Ok(run)
    }

    pub async fn complete_ingestion_run(
        pool: &PgPool,
        run_id: Uuid,
        status: &str,
        total_fetched: i32,
        total_processed: i32,
        total_indexed: i32,
        errors: &[String],
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_runs
            SET status = $2,
                total_fetched = $3,
                total_processed = $4,
                total_indexed = $5,
                error_count = $6,
                errors = $7,
                completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(total_fetched)
        .bind(total_processed)
        .bind(total_indexed)
        .bind(errors.len() as i32)
        .bind(serde_json::json!(errors))
        .execute(pool)
        .await?;

        Ok(())
    }
}
