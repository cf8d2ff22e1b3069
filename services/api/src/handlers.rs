//! Axum Handlers for the REST API
//!
//! This module contains the operator surface and the telephony webhook.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{CommandAck, ErrorResponse, SessionSummary},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List the live interview sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Summaries of every live session", body = [SessionSummary])
    )
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.snapshot())
}

/// Force an interview forward one stage, bypassing oversight.
#[utoipa::path(
    post,
    path = "/sessions/{id}/advance",
    responses(
        (status = 202, description = "Advance command delivered to the session", body = CommandAck),
        (status = 404, description = "No live session with that id", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn force_advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.registry.force_advance(id).await {
        return Err(ApiError::NotFound(format!(
            "No live session with id '{}'",
            id
        )));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(CommandAck {
            session_id: id,
            command: "force_advance".to_string(),
        }),
    ))
}

/// Answer a telephony webhook with call-connection markup.
///
/// The gateway requests this route when a call arrives and is told to open
/// a media stream back to this service. Mounted for both GET and POST since
/// gateways are configurable either way.
#[utoipa::path(
    post,
    path = "/incoming-call",
    responses(
        (status = 200, description = "Connection markup for the call", body = String, content_type = "application/xml"),
        (status = 400, description = "Callback host could not be determined", body = ErrorResponse)
    )
)]
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let host = state
        .config
        .public_host
        .clone()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::BadRequest("host header is required".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "application/xml")],
        stream_twiml(&host),
    )
        .into_response())
}

/// Markup directing the gateway to stream call audio to the media-stream
/// endpoint.
fn stream_twiml(host: &str) -> String {
    format!(
        r#"<Response>
    <Say>Please wait while we connect you to the AI Interviewer.</Say>
    <Connect>
        <Stream url="wss://{host}/media-stream" track="inbound_track">
            <Parameter name="codec" value="PCMU" />
        </Stream>
    </Connect>
</Response>"#
    )
}
