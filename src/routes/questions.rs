use crate::{dto::question_dto::CreateQuestionPayload, error::Result, AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.question_service.create_question(payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}
