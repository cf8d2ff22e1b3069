//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoints, and OpenAPI documentation.

use crate::{
    handlers,
    models::{CommandAck, ErrorResponse, SessionSummary},
    state::AppState,
    ws::{media_stream_handler, observe_handler},
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_sessions,
        handlers::force_advance,
        handlers::incoming_call,
    ),
    components(
        schemas(SessionSummary, CommandAck, ErrorResponse)
    ),
    tags(
        (name = "Viva API", description = "Live session oversight for the Viva voice interviewer")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{id}/advance", post(handlers::force_advance))
        .route(
            "/incoming-call",
            get(handlers::incoming_call).post(handlers::incoming_call),
        )
        .route("/media-stream", get(media_stream_handler))
        .route("/observe", get(observe_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
