//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use salesforge_core::{
    Sequence, SequenceId, SequencePatch, SequenceStore, Step, StepId, StepPatch, Timestamp,
};

use crate::error::{ApiError, Operation};
use crate::AppState;

/// Step item of a create request
#[derive(Debug, Deserialize)]
pub struct CreateStepRequest {
    pub subject: String,
    pub content: String,
}

/// Request to create a sequence with its steps
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSequenceRequest {
    pub name: String,
    #[serde(default)]
    pub open_tracking_enabled: bool,
    #[serde(default)]
    pub click_tracking_enabled: bool,
    pub steps: Vec<CreateStepRequest>,
}

impl CreateSequenceRequest {
    fn into_sequence(self) -> Sequence {
        let steps = self
            .steps
            .into_iter()
            .map(|step| Step::new(step.subject, step.content))
            .collect();
        Sequence::new(
            self.name,
            self.open_tracking_enabled,
            self.click_tracking_enabled,
            steps,
        )
    }
}

/// Request to replace both tracking flags
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSequenceRequest {
    #[serde(default)]
    pub open_tracking_enabled: bool,
    #[serde(default)]
    pub click_tracking_enabled: bool,
}

/// Response for a tracking flags update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSequenceResponse {
    pub id: SequenceId,
    pub open_tracking_enabled: bool,
    pub click_tracking_enabled: bool,
    pub updated_at: Timestamp,
}

/// Request to replace a step's subject and content
#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    pub subject: String,
    pub content: String,
}

/// Liveness check
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": salesforge_core::core_version(),
    }))
}

/// Create a sequence and all of its steps
pub async fn create_sequence(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSequenceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Sequence>), ApiError> {
    let Json(request) = payload?;
    let mut sequence = request.into_sequence();
    sequence.validate()?;

    let sequence = state
        .with_store(move |store| {
            store.create_sequence(&mut sequence)?;
            Ok(sequence)
        })
        .await
        .map_err(|err| ApiError::from_store(Operation::Create, err))?;

    Ok((StatusCode::CREATED, Json(sequence)))
}

/// Get a sequence with its ordered steps
pub async fn fetch_sequence(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Sequence>, ApiError> {
    let id = parse_sequence_id(&raw_id)?;

    let sequence = state
        .with_store(move |store| store.fetch_sequence(id))
        .await
        .map_err(|err| ApiError::from_store(Operation::Fetch, err))?;

    Ok(Json(sequence))
}

/// Replace a sequence's tracking flags
pub async fn update_sequence(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateSequenceRequest>, JsonRejection>,
) -> Result<Json<UpdateSequenceResponse>, ApiError> {
    let id = parse_sequence_id(&raw_id)?;
    let Json(request) = payload?;
    let patch = SequencePatch {
        open_tracking_enabled: request.open_tracking_enabled,
        click_tracking_enabled: request.click_tracking_enabled,
    };

    let updated = state
        .with_store(move |store| store.update_sequence(id, &patch))
        .await
        .map_err(|err| ApiError::from_store(Operation::Update, err))?;

    Ok(Json(UpdateSequenceResponse {
        id: updated.id,
        open_tracking_enabled: updated.open_tracking_enabled,
        click_tracking_enabled: updated.click_tracking_enabled,
        updated_at: updated.updated_at,
    }))
}

/// Replace a step's subject and content
pub async fn update_step(
    State(state): State<Arc<AppState>>,
    Path((raw_id, raw_step_id)): Path<(String, String)>,
    payload: Result<Json<UpdateStepRequest>, JsonRejection>,
) -> Result<Json<Step>, ApiError> {
    let sequence_id = parse_sequence_id(&raw_id)?;
    let step_id = parse_step_id(&raw_step_id)?;
    let Json(request) = payload?;
    let patch = StepPatch {
        sequence_id,
        subject: request.subject,
        content: request.content,
    };
    patch.validate()?;

    let step = state
        .with_store(move |store| store.update_step(step_id, &patch))
        .await
        .map_err(|err| ApiError::from_store(Operation::Update, err))?;

    Ok(Json(step))
}

/// Delete one step of a sequence
pub async fn delete_step(
    State(state): State<Arc<AppState>>,
    Path((raw_id, raw_step_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let sequence_id = parse_sequence_id(&raw_id)?;
    let step_id = parse_step_id(&raw_step_id)?;

    state
        .with_store(move |store| store.delete_step(step_id, sequence_id))
        .await
        .map_err(|err| ApiError::from_store(Operation::Delete, err))?;

    Ok(StatusCode::NO_CONTENT)
}

fn parse_sequence_id(raw: &str) -> Result<SequenceId, ApiError> {
    parse_resource_id(raw, "Invalid sequence ID")
}

fn parse_step_id(raw: &str) -> Result<StepId, ApiError> {
    parse_resource_id(raw, "Invalid step ID")
}

// Ids are non-negative; anything past i64::MAX cannot name a stored row.
fn parse_resource_id(raw: &str, message: &str) -> Result<i64, ApiError> {
    raw.parse::<u64>()
        .ok()
        .and_then(|id| i64::try_from(id).ok())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::parse_resource_id;

    #[test]
    fn resource_ids_must_be_non_negative_integers() {
        assert_eq!(parse_resource_id("42", "bad").unwrap(), 42);
        assert_eq!(parse_resource_id("0", "bad").unwrap(), 0);

        for raw in ["-1", "abc", "", "1.5", "18446744073709551615"] {
            let err = parse_resource_id(raw, "Invalid step ID").unwrap_err();
            assert_eq!(err.message(), "Invalid step ID", "input {raw:?}");
        }
    }
}
