use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub enum QuestionType {
    McqSingle,
    McqMultiple,
    TrueFalse,
    Paragraph,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::McqSingle => "mcq_single",
            QuestionType::McqMultiple => "mcq_multiple",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Paragraph => "paragraph",
        }
    }

    /// Types that carry an options array and a correct-option index.
    pub fn is_mcq(&self) -> bool {
        matches!(self, QuestionType::McqSingle | QuestionType::McqMultiple)
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub translations: Option<JsonValue>,
    pub question_type: QuestionType,
    pub difficulty: Option<i32>,
    pub options: Option<JsonValue>,
    pub correct_option: Option<i32>,
    pub explanation: Option<String>,
    pub paragraph_id: Option<Uuid>,
    pub is_ai_generated: bool,
    pub citation: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Paragraph {
    pub id: Uuid,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_round_trips_through_serde_names() {
        let qt: QuestionType = serde_json::from_str("\"mcq_single\"").unwrap();
        assert_eq!(qt, QuestionType::McqSingle);
        assert_eq!(serde_json::to_string(&qt).unwrap(), "\"mcq_single\"");
        assert_eq!(qt.as_str(), "mcq_single");
    }

    #[test]
    fn only_mcq_types_carry_options() {
        assert!(QuestionType::McqSingle.is_mcq());
        assert!(QuestionType::McqMultiple.is_mcq());
        assert!(!QuestionType::TrueFalse.is_mcq());
        assert!(!QuestionType::Paragraph.is_mcq());
    }
}
