use crate::models::question::QuestionType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExamPayload {
    pub blueprint_id: Uuid,
    #[validate(length(min = 1))]
    pub title: String,
}

/// One deficient-or-satisfied blueprint rule as seen from an exam section.
#[derive(Debug, Clone, Serialize)]
pub struct ShortageRow {
    pub section_id: Uuid,
    pub section_title: String,
    pub rule_id: Uuid,
    pub question_type: QuestionType,
    pub required: i32,
    pub linked: i64,
    pub shortage: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFailureDto {
    pub section_position: i32,
    pub section_title: String,
    pub rule_id: Uuid,
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateMissingResponse {
    pub success: bool,
    pub generated_count: i64,
    pub failures: Vec<RuleFailureDto>,
}
