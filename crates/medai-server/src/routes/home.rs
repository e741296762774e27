//! Public prescription analyzer. Nothing is stored.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use medai_api::ApiError;

use super::upload_file;
use crate::ingest::Analysis;
use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/analyze_prescription", post(analyze_prescription))
}

async fn analyze_prescription(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Analysis>, ApiError> {
    let upload = upload_file(multipart).await?;
    let analysis = state
        .pipeline
        .analyze(&upload.bytes)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    tracing::info!(
        valid_predictions = analysis.diseases.valid().count(),
        "home analysis complete"
    );
    Ok(Json(analysis))
}
