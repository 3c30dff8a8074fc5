use crate::models::question::QuestionType;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[validate(length(min = 1))]
    pub text: String,
    pub translations: Option<JsonValue>,
    pub question_type: QuestionType,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i32>,
    pub options: Option<Vec<String>>,
    pub correct_option: Option<i32>,
    pub explanation: Option<String>,
    pub paragraph_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// When present, the question is also linked into this exam section.
    #[validate(nested)]
    pub link: Option<SectionLinkPayload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SectionLinkPayload {
    pub exam_section_id: Uuid,
    #[validate(range(min = 0.0))]
    pub marks: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub negative_marks: f64,
}
