//! API Models
//!
//! Data structures for the REST operator surface, annotated for OpenAPI
//! generation with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A point-in-time view of one live interview session.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SessionSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    /// Current stage label, e.g. `TECHNICAL_PROBE`.
    #[schema(example = "SCREENING")]
    pub stage: String,
    /// Number of transcript turns recorded so far.
    pub turns: usize,
    pub concluded: bool,
    pub started_at: DateTime<Utc>,
}

/// Acknowledgement that an operator command was delivered to a live session.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CommandAck {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(example = "force_advance")]
    pub command: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
