//! HTTP API over the retriever and synthesizer.
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info, warn};

pub use routes::build_router;

use crate::retriever::{RetrievalError, Retriever};
use crate::synthesizer::{SynthesisError, Synthesizer};

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<dyn Retriever>,
    pub synthesizer: Arc<Synthesizer>,
    /// Matches returned by `/retrieval`.
    pub search_top_k: usize,
}

/// Downstream failure, rendered as `500 {"detail": ...}`.
#[derive(Debug)]
pub struct ApiError(String);

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { detail: self.0 }),
        )
            .into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        Self(e.to_string())
    }
}

impl From<SynthesisError> for ApiError {
    fn from(e: SynthesisError) -> Self {
        Self(e.to_string())
    }
}

/// Serves the API until Ctrl-C.
pub async fn serve(state: AppState, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {bind}:{port}"))?;
    if bind == "0.0.0.0" {
        warn!("Binding to all interfaces; the API has no authentication");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
