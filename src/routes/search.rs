use axum::{
    extract::State,
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::DatabaseOperations;
use crate::models::{
    AppState, SearchRequest, SearchResponse, SummarizeRequest, SummarizeResponse,
};
use crate::types::{AppError, AppResult, Source, SummaryInput};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(post_search))
        .route("/api/summarize", post(post_summarize))
        .with_state(state)
}

async fn post_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> AppResult<ResponseJson<SearchResponse>> {
    let response = state.pipeline.search(request).await?;
    Ok(Json(response))
}

/// Summarize stored documents by id.
///
/// Ids that do not parse as UUIDs or do not exist are skipped; the call only
/// fails when no requested id resolves to a stored document.
async fn post_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> AppResult<ResponseJson<SummarizeResponse>> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let ids: Vec<Uuid> = request
        .ids
        .iter()
        .filter_map(|id| match Uuid::parse_str(id) {
            Ok(uuid) => Some(uuid),
            Err(_) => {
                warn!(id = %id, "Skipping malformed document id");
                None
            }
        })
        .collect();

    let documents = DatabaseOperations::get_documents_by_ids(&state.pool, &ids)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    if documents.is_empty() {
        return Err(AppError::NotFound(
            "None of the requested documents exist".to_string(),
        ));
    }

    info!(requested = request.ids.len(), resolved = documents.len(), "Summarize request");

    let inputs: Vec<SummaryInput> = documents
        .iter()
        .map(|doc| SummaryInput {
            id: doc.id.to_string(),
            title: doc.title.clone(),
            content: doc.body.clone(),
            source: doc.source.parse().unwrap_or(Source::Papers),
        })
        .collect();

    let summaries = state.pipeline.summarize(&inputs).await?;

    Ok(Json(SummarizeResponse { summaries }))
}
