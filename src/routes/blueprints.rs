use crate::{
    dto::blueprint_dto::{AddMaterialPayload, CreateBlueprintPayload},
    error::Result,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

#[axum::debug_handler]
pub async fn create_blueprint(
    State(state): State<AppState>,
    Json(payload): Json<CreateBlueprintPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let blueprint = state.blueprint_service.create_blueprint(payload).await?;
    Ok((StatusCode::CREATED, Json(blueprint)))
}

pub async fn list_blueprints(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let blueprints = state.blueprint_service.list_blueprints().await?;
    Ok(Json(blueprints))
}

pub async fn get_blueprint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let blueprint = state.blueprint_service.get_blueprint(id).await?;
    Ok(Json(blueprint))
}

#[axum::debug_handler]
pub async fn add_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMaterialPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let material = state
        .blueprint_service
        .add_material(id, payload, &state.embed_service)
        .await?;
    Ok((StatusCode::CREATED, Json(material)))
}
