use crate::models::question::QuestionType;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBlueprintPayload {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    #[validate(
        length(min = 1, message = "A blueprint needs at least one section"),
        nested
    )]
    pub sections: Vec<CreateSectionPayload>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateSectionPayload {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(
        length(min = 1, message = "A section needs at least one rule"),
        nested
    )]
    pub rules: Vec<CreateRulePayload>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateRulePayload {
    pub question_type: QuestionType,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i32>,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    #[validate(range(min = 1))]
    pub number_of_questions: i32,
    #[validate(range(min = 0.0))]
    pub marks_per_question: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub negative_marks: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMaterialPayload {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1, message = "Material content cannot be empty"))]
    pub content: String,
}
