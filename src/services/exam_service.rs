use crate::dto::exam_dto::CreateExamPayload;
use crate::error::{Error, Result};
use crate::models::blueprint::BlueprintSection;
use crate::models::exam::{Exam, ExamSection};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const EXAM_COLUMNS: &str = "id, blueprint_id, title, created_at, updated_at";
const SECTION_COLUMNS: &str = "id, exam_id, blueprint_section_id, title, position";

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExamSectionSummary {
    #[serde(flatten)]
    pub section: ExamSection,
    pub linked_questions: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExamDetail {
    #[serde(flatten)]
    pub exam: Exam,
    pub sections: Vec<ExamSectionSummary>,
}

#[derive(Clone)]
pub struct ExamService {
    pool: PgPool,
}

impl ExamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Instantiates an exam from a blueprint. Every exam section records the
    /// id of the blueprint section it mirrors, so later shortage computation
    /// never has to match sections by position.
    pub async fn create_exam(&self, payload: CreateExamPayload) -> Result<ExamDetail> {
        let blueprint_sections = sqlx::query_as::<_, BlueprintSection>(
            "SELECT id, blueprint_id, title, position FROM blueprint_sections WHERE blueprint_id = $1 ORDER BY position",
        )
        .bind(payload.blueprint_id)
        .fetch_all(&self.pool)
        .await?;
        if blueprint_sections.is_empty() {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM blueprints WHERE id = $1)",
            )
            .bind(payload.blueprint_id)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                return Err(Error::NotFound("Blueprint not found".to_string()));
            }
        }

        let exam_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO exams (id, blueprint_id, title) VALUES ($1, $2, $3)")
            .bind(exam_id)
            .bind(payload.blueprint_id)
            .bind(payload.title.trim())
            .execute(&mut *tx)
            .await?;

        for section in &blueprint_sections {
            sqlx::query(
                r#"
                INSERT INTO exam_sections (id, exam_id, blueprint_section_id, title, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(exam_id)
            .bind(section.id)
            .bind(&section.title)
            .bind(section.position)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.get_exam_detail(exam_id).await
    }

    pub async fn get_exam(&self, id: Uuid) -> Result<Exam> {
        sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))
    }

    pub async fn list_exams(&self) -> Result<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams ORDER BY created_at DESC LIMIT 100"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    pub async fn sections_for_exam(&self, exam_id: Uuid) -> Result<Vec<ExamSection>> {
        let sections = sqlx::query_as::<_, ExamSection>(&format!(
            "SELECT {SECTION_COLUMNS} FROM exam_sections WHERE exam_id = $1 ORDER BY position"
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    pub async fn get_exam_detail(&self, id: Uuid) -> Result<ExamDetail> {
        let exam = self.get_exam(id).await?;
        let sections = self.sections_for_exam(id).await?;

        #[derive(FromRow)]
        struct CountRow {
            exam_section_id: Uuid,
            linked: i64,
        }
        let section_ids: Vec<Uuid> = sections.iter().map(|s| s.id).collect();
        let counts = sqlx::query_as::<_, CountRow>(
            r#"
            SELECT exam_section_id, COUNT(*) AS linked
            FROM section_questions
            WHERE exam_section_id = ANY($1)
            GROUP BY exam_section_id
            "#,
        )
        .bind(&section_ids)
        .fetch_all(&self.pool)
        .await?;
        let counts: HashMap<Uuid, i64> = counts
            .into_iter()
            .map(|row| (row.exam_section_id, row.linked))
            .collect();

        let sections = sections
            .into_iter()
            .map(|section| {
                let linked_questions = counts.get(&section.id).copied().unwrap_or(0);
                ExamSectionSummary {
                    section,
                    linked_questions,
                }
            })
            .collect();

        Ok(ExamDetail { exam, sections })
    }
}
