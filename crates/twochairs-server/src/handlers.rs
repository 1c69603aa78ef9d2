//! HTTP handlers over the round orchestrator.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use twochairs_core::ids::{SessionId, UserId};
use twochairs_core::roles::Role;
use twochairs_engine::{IncomingMessage, RoundResponse};
use twochairs_store::messages::MessageRow;

use crate::error::ApiError;
use crate::server::AppState;

pub const TEACH_MESSAGE: &str = "Two Chairs ready.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub display_name: Option<String>,
    pub trusted_contact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    pub user_id: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub teach: &'static str,
}

/// Missing fields deserialize empty so they surface as validation errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostMessageRequest {
    pub session_id: String,
    pub role: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub role: Role,
    pub text: String,
    pub created_at: String,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            role: row.role,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "time": chrono::Utc::now().to_rfc3339() }))
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Option<Json<CreateUserRequest>>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let user = state
        .orchestrator
        .create_user(body.display_name.as_deref(), body.trusted_contact.as_deref())?;
    info!(user_id = %user.id, "user created");
    Ok(Json(json!({ "userId": user.id })))
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let user_id = body
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(UserId::from_raw);

    let session = state
        .orchestrator
        .create_session(user_id.as_ref(), body.mode.as_deref())?;
    Ok(Json(CreateSessionResponse {
        session_id: session.id,
        user_id: session.user_id,
        teach: TEACH_MESSAGE,
    }))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let messages: Vec<MessageView> = state
        .orchestrator
        .list_messages(&SessionId::from_raw(session_id))?
        .into_iter()
        .map(MessageView::from)
        .collect();
    Ok(Json(json!({ "messages": messages })))
}

pub async fn post_message(
    State(state): State<AppState>,
    Json(body): Json<PostMessageRequest>,
) -> Result<Json<RoundResponse>, ApiError> {
    let message = IncomingMessage::parse(&body.session_id, &body.role, &body.text)?;
    let response = state.orchestrator.post_message(message).await?;
    Ok(Json(response))
}

pub async fn retry_round(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<RoundResponse>, ApiError> {
    let response = state
        .orchestrator
        .retry_round(&SessionId::from_raw(session_id))
        .await?;
    Ok(Json(response))
}
