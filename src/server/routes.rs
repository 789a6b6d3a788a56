use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use super::{ApiError, AppState};
use crate::retriever::ScoredMatch;

#[derive(Deserialize)]
struct QueryParams {
    query: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct SynthesisResponse {
    response: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/retrieval", get(retrieval_handler))
        .route("/synthesis", get(synthesis_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Up and Running",
    })
}

async fn retrieval_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<ScoredMatch>>, ApiError> {
    let matches = state
        .retriever
        .retrieve(&params.query, state.search_top_k)
        .await?;
    Ok(Json(matches))
}

async fn synthesis_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    let response = state.synthesizer.synthesize(&params.query).await?;
    Ok(Json(SynthesisResponse { response }))
}
