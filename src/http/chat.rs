//! Chat and profile routes.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::engine::profile::{FieldKind, FieldValue, Profile, ProfileField};
use crate::engine::{SessionPrompt, TurnOutcome};
use crate::error::EngineError;
use crate::store::ChatExchange;

use super::{ApiError, AppState, Identity};

// ── Request/response bodies ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatInput {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UserNameInput {
    pub name: String,
}

/// Explicit field update. Exactly one of the value fields must carry the
/// value matching the target field's kind.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateInput {
    pub field_name: String,
    #[serde(default)]
    pub field_value: Option<String>,
    #[serde(default)]
    pub field_value_int: Option<u32>,
    #[serde(default)]
    pub field_value_list: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_field: Option<ProfileField>,
    pub profile_complete: bool,
}

impl From<SessionPrompt> for PromptResponse {
    fn from(prompt: SessionPrompt) -> Self {
        Self {
            message: prompt.message,
            next_field: prompt.next_field,
            profile_complete: prompt.profile_complete,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatTurnResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_field: Option<ProfileField>,
    pub profile_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatExchange>>,
}

impl From<TurnOutcome> for ChatTurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            response: outcome.response,
            next_field: outcome.next_field,
            profile_complete: outcome.profile_complete,
            history: outcome.history,
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /chat/start — start or resume a session.
pub async fn start_chat(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<PromptResponse>, ApiError> {
    let prompt = state.completion.start_session(&user).await?;
    Ok(Json(prompt.into()))
}

/// POST /chat — submit one conversational turn.
pub async fn chat(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(input): Json<ChatInput>,
) -> Result<Json<ChatTurnResponse>, ApiError> {
    let outcome = state.completion.submit_turn(&user, &input.message).await?;
    Ok(Json(outcome.into()))
}

/// POST /chat/set_name — store the user's name and confirm it.
pub async fn set_name(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(input): Json<UserNameInput>,
) -> Result<Json<PromptResponse>, ApiError> {
    let prompt = state.completion.set_name(&user, &input.name).await?;
    Ok(Json(prompt.into()))
}

/// POST /chat/update_profile — explicit typed field update.
pub async fn update_profile(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(input): Json<ProfileUpdateInput>,
) -> Result<Json<PromptResponse>, ApiError> {
    let field: ProfileField = input.field_name.parse().map_err(crate::error::Error::Engine)?;
    let value = extract_value(field, input)?;
    let prompt = state.completion.set_field(&user, field, value).await?;
    Ok(Json(prompt.into()))
}

/// GET /chat/history — windowed conversation read view.
pub async fn chat_history(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<ChatExchange>>, ApiError> {
    Ok(Json(state.completion.history(&user).await?))
}

/// GET /profile — the full stored record.
pub async fn get_profile(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.completion.profile(&user).await?))
}

/// GET /debug/profile_status — read-only engine state.
pub async fn profile_status(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<crate::engine::ProfileStatus>, ApiError> {
    Ok(Json(state.completion.status(&user).await?))
}

/// Pick the value variant matching the field's kind out of the loosely
/// shaped update body.
fn extract_value(field: ProfileField, input: ProfileUpdateInput) -> Result<FieldValue, ApiError> {
    let value = match field.kind() {
        FieldKind::Number => input.field_value_int.map(FieldValue::Number),
        FieldKind::List => input.field_value_list.map(FieldValue::List),
        FieldKind::Text => input.field_value.map(FieldValue::Text),
    };
    value.ok_or_else(|| {
        crate::error::Error::Engine(EngineError::InvalidField {
            field: field.to_string(),
            reason: "no value of the required kind was provided".to_string(),
        })
        .into()
    })
}
