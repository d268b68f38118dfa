//! Artifact workflow routes.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use crate::engine::workflow::{StepOutcome, WorkflowState};

use super::{ApiError, AppState, Identity};

#[derive(Debug, Deserialize)]
pub struct StepInput {
    pub response: String,
}

/// POST /artifact/step/{step_name} — process user input for one workflow
/// step, store the conversation, and commit the artifact value on
/// confirmation.
pub async fn submit_step(
    State(state): State<AppState>,
    Path(step_name): Path<String>,
    Identity(user): Identity,
    Json(input): Json<StepInput>,
) -> Result<Json<StepOutcome>, ApiError> {
    let outcome = state
        .workflow
        .submit_step(&user, &step_name, &input.response)
        .await?;
    Ok(Json(outcome))
}

/// GET /artifact — current workflow state.
pub async fn get_artifact(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<WorkflowState>, ApiError> {
    Ok(Json(state.workflow.state(&user).await?))
}
