use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: Uuid,
    pub blueprint_id: Option<Uuid>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exam sections carry an explicit link to the blueprint section they were
/// instantiated from; correspondence is never inferred from ordinal position.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamSection {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub blueprint_section_id: Uuid,
    pub title: String,
    pub position: i32,
}

/// Link entity between a question and an exam section. Marks and position are
/// per-link: the same question may appear in several sections with different
/// weights.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionQuestion {
    pub id: Uuid,
    pub exam_section_id: Uuid,
    pub question_id: Uuid,
    pub marks: Decimal,
    pub negative_marks: Decimal,
    pub position: i32,
}
