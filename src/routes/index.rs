use axum::{
    extract::State,
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;
use validator::Validate;

use crate::models::{AppState, IndexRequest, IndexResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/index", post(post_index))
        .with_state(state)
}

async fn post_index(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> AppResult<ResponseJson<IndexResponse>> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    info!(source = %request.source, documents = request.documents.len(), "Index request");

    let response = state
        .ingestor
        .ingest(request.source, request.documents)
        .await?;

    Ok(Json(response))
}
