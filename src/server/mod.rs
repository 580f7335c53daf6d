//! HTTP surface: chat streaming, tool explanations and health.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::error::{LuminaryError, Result};
use crate::orchestrator::{ChatRequest, ExplainToolRequest, Orchestrator};

/// JSON error answered before any event was streamed.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LuminaryError> for ApiError {
    fn from(err: LuminaryError) -> Self {
        let status = match err {
            LuminaryError::RequestValidation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            LuminaryError::RequestValidation(ref detail) => detail.clone(),
            ref other => other.user_message(),
        };
        tracing::warn!(status = status.as_u16(), error = %err, "request rejected");
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn parse_body(body: &Bytes) -> std::result::Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| {
        ApiError::from(LuminaryError::RequestValidation(
            "Request body must be valid JSON.".into(),
        ))
    })
}

/// Router over an orchestrator, with permissive CORS.
pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/explain-tool", post(explain_tool))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, orchestrator: Orchestrator) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "luminary server listening");
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                futures::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Stream a turn as SSE. Dropping the response stream cancels the turn.
async fn chat(
    State(orchestrator): State<Orchestrator>,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let request = ChatRequest::from_json(parse_body(&body)?)?;
    let handle = orchestrator.start_turn(request, CancellationToken::new())?;
    tracing::info!(turn_id = %handle.turn_id, message_id = %handle.message_id, "turn accepted");

    let events = handle.into_stream().filter_map(|event| async move {
        match Event::default().event(event.kind()).json_data(&event) {
            Ok(sse) => Some(Ok::<_, Infallible>(sse)),
            Err(err) => {
                tracing::warn!(seq = event.seq, error = %err, "dropping unencodable event");
                None
            }
        }
    });
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}

/// Stream a short plain-text phrase for a tool call.
async fn explain_tool(
    State(orchestrator): State<Orchestrator>,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let request: ExplainToolRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| LuminaryError::RequestValidation(format!("Invalid request: {e}.")))?;
    let mut phrases = orchestrator.explain_tool(&request).await?;

    let text = async_stream::stream! {
        while let Some(chunk) = phrases.next().await {
            match chunk {
                Ok(text) => yield Ok::<_, Infallible>(Bytes::from(text)),
                Err(err) => {
                    tracing::warn!(error = %err, "explanation stream failed");
                    break;
                }
            }
        }
    };
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(text),
    )
        .into_response())
}
