use crate::models::question::QuestionType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Blueprint {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlueprintSection {
    pub id: Uuid,
    pub blueprint_id: Uuid,
    pub title: String,
    pub position: i32,
}

/// A shortage unit: target counts of rules within a section do not overlap.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlueprintRule {
    pub id: Uuid,
    pub section_id: Uuid,
    pub question_type: QuestionType,
    pub difficulty: Option<i32>,
    pub number_of_questions: i32,
    pub marks_per_question: Decimal,
    pub negative_marks: Decimal,
    pub position: i32,
}
