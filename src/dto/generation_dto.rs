use crate::models::question::QuestionType;
use serde::{Deserialize, Serialize};

/// One element of the strict JSON array the generation model must return.
///
/// `options` and `correct_option` are required iff the type is an MCQ type;
/// `paragraph_text` is required iff the type is `paragraph`. Shape violations
/// are rejected at parse time, never repaired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_option: Option<i32>,
    #[serde(default)]
    pub difficulty: Option<i32>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub paragraph_text: Option<String>,
}
