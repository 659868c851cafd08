use crate::error::RelayError;
use crate::pipeline::{InboundRequest, WebhookPipeline};
use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub dockerhub: Arc<dyn WebhookPipeline>,
    pub gcr: Arc<dyn WebhookPipeline>,
}

pub async fn readiness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn liveness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn dockerhub_webhook(State(state): State<AppState>, request: Request) -> Response {
    serve_webhook(state.dockerhub.as_ref(), request).await
}

pub async fn gcr_webhook(State(state): State<AppState>, request: Request) -> Response {
    serve_webhook(state.gcr.as_ref(), request).await
}

/// Runs one pipeline for an HTTP request and turns its outcome into the response.
async fn serve_webhook(pipeline: &dyn WebhookPipeline, request: Request) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let remote = remote_addr.map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
    info!(provider = pipeline.name(), %remote, "Received webhook request");

    let outcome = match read_request(remote_addr, request).await {
        Ok(inbound) => pipeline.handle(inbound).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            warn!(
                provider = pipeline.name(),
                %remote,
                kind = e.kind(),
                error = %e,
                "Rejected webhook request"
            );
            e.into_response()
        }
    }
}

async fn read_request(
    remote_addr: Option<SocketAddr>,
    request: Request,
) -> Result<InboundRequest, RelayError> {
    if request.method() != Method::POST {
        return Err(RelayError::BadMethod(request.method().to_string()));
    }

    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .map_err(|e| RelayError::MalformedPayload(format!("invalid query string: {}", e)))?;

    let body = to_bytes(request.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| {
            RelayError::MalformedPayload(format!("failed to read request body: {}", e))
        })?;

    Ok(InboundRequest {
        remote_addr,
        query,
        body,
    })
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/dockerhub", any(dockerhub_webhook))
        .route("/gcr", any(gcr_webhook))
        .with_state(state)
}
