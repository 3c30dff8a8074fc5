use crate::{
    dto::exam_dto::{CreateExamPayload, GenerateMissingResponse, RuleFailureDto},
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
pub async fn create_exam(
    State(state): State<AppState>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let exam = state.exam_service.create_exam(payload).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn list_exams(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let exams = state.exam_service.list_exams().await?;
    Ok(Json(exams))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state.exam_service.get_exam_detail(id).await?;
    Ok(Json(exam))
}

pub async fn get_section_questions(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state
        .question_service
        .questions_for_section(section_id)
        .await?;
    Ok(Json(questions))
}

pub async fn get_shortages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let shortages = state.generation_service.compute_shortages(id).await?;
    Ok(Json(shortages))
}

/// Walks the exam's blueprint rules and generates questions for every
/// positive shortage. Always returns 200 with a partial-success report once
/// the exam and blueprint have been resolved; per-rule failures are listed,
/// not thrown.
#[axum::debug_handler]
pub async fn generate_missing_ai(
    State(state): State<AppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let report = state.generation_service.generate_missing(exam_id).await?;
    let failures = report
        .failures
        .into_iter()
        .map(|f| RuleFailureDto {
            section_position: f.section_position,
            section_title: f.section_title,
            rule_id: f.rule_id,
            stage: f.error.stage().to_string(),
            error: f.error.to_string(),
        })
        .collect();
    Ok(Json(GenerateMissingResponse {
        success: true,
        generated_count: report.generated_count,
        failures,
    }))
}
