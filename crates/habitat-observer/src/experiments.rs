//! Experiment CRUD and variant control routes.

use axum::extract::{Path, State};
use axum::Json;
use habitat_core::VariantSpec;
use habitat_types::{Experiment, ExperimentId, Variant};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /api/experiments`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateExperimentBody {
    /// Display name.
    pub name: String,
}

/// Request body for `POST /api/experiments/{id}/run`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RunBody {
    /// Policy type for genesis roster generation when the variant has no
    /// explicit roster.
    #[serde(default)]
    pub genesis_policy: Option<String>,
}

/// `POST /api/experiments` -- create an experiment.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateExperimentBody>,
) -> Result<Json<Experiment>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest(String::from("name must not be empty")));
    }
    Ok(Json(state.controller.create_experiment(body.name).await))
}

/// `GET /api/experiments` -- list experiments, newest first.
pub async fn list(State(state): State<AppState>) -> Json<Vec<Experiment>> {
    Json(state.controller.list_experiments().await)
}

/// `GET /api/experiments/{id}` -- one experiment.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Experiment>, ApiError> {
    let id = parse_experiment_id(&id)?;
    Ok(Json(state.controller.get_experiment(id).await?))
}

/// `DELETE /api/experiments/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_experiment_id(&id)?;
    state.controller.delete_experiment(id).await?;
    Ok(Json(json!({"status": "deleted"})))
}

/// `POST /api/experiments/{id}/variants` -- append a variant.
pub async fn add_variant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(spec): Json<VariantSpec>,
) -> Result<Json<Variant>, ApiError> {
    let id = parse_experiment_id(&id)?;
    if spec.duration_ticks == 0 {
        return Err(ApiError::BadRequest(String::from(
            "duration_ticks must be at least 1",
        )));
    }
    Ok(Json(state.controller.add_variant(id, spec).await?))
}

/// `POST /api/experiments/{id}/run` -- run the next pending variant.
pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RunBody>>,
) -> Result<Json<Variant>, ApiError> {
    let id = parse_experiment_id(&id)?;
    let genesis_policy = body.and_then(|Json(b)| b.genesis_policy);
    Ok(Json(
        state.controller.run_next_variant(id, genesis_policy).await?,
    ))
}

/// `POST /api/experiments/{id}/stop` -- stop the running variant.
pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_experiment_id(&id)?;
    state.controller.stop_variant(id).await?;
    Ok(Json(json!({"status": "stopped"})))
}

/// Parse a path segment into an [`ExperimentId`].
fn parse_experiment_id(raw: &str) -> Result<ExperimentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid experiment id: {raw}")))
}
