use crate::dto::generation_dto::GeneratedQuestion;
use crate::dto::question_dto::CreateQuestionPayload;
use crate::error::{Error, Result};
use crate::models::blueprint::BlueprintRule;
use crate::models::exam::SectionQuestion;
use crate::models::question::{Paragraph, Question, QuestionType};
use crate::services::tag_service;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const QUESTION_COLUMNS: &str = "id, text, translations, question_type, difficulty, options, \
    correct_option, explanation, paragraph_id, is_ai_generated, citation, created_at";

#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkedQuestion {
    pub link: SectionQuestion,
    pub question: Question,
    pub paragraph: Option<Paragraph>,
}

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Counts link rows in a section whose question satisfies a blueprint
    /// rule: same type, exact difficulty when the rule specifies one, and at
    /// least one shared tag when the rule has tags. A tag-less rule matches
    /// any question of the type/difficulty.
    pub async fn count_matching_linked(
        &self,
        exam_section_id: Uuid,
        rule: &BlueprintRule,
        rule_tag_ids: &[Uuid],
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM section_questions sq
            JOIN questions q ON q.id = sq.question_id
            WHERE sq.exam_section_id = $1
              AND q.question_type = $2
              AND ($3::int IS NULL OR q.difficulty = $3)
              AND (cardinality($4::uuid[]) = 0 OR EXISTS (
                    SELECT 1 FROM question_tags qt
                    WHERE qt.question_id = q.id AND qt.tag_id = ANY($4)))
            "#,
        )
        .bind(exam_section_id)
        .bind(rule.question_type)
        .bind(rule.difficulty)
        .bind(rule_tag_ids.to_vec())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Inserts one generated question, its tags and its section link in a
    /// single transaction: a failure partway never leaves an unlinked
    /// question behind.
    pub async fn insert_generated(
        &self,
        exam_section_id: Uuid,
        rule: &BlueprintRule,
        rule_tag_ids: &[Uuid],
        citation: &str,
        item: &GeneratedQuestion,
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let paragraph_id = match (item.question_type, item.paragraph_text.as_deref()) {
            (QuestionType::Paragraph, Some(content)) => {
                Some(insert_paragraph(&mut tx, content).await?)
            }
            _ => None,
        };

        let question_id = Uuid::new_v4();
        let options = match &item.options {
            Some(opts) => Some(serde_json::to_value(opts)?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO questions
                (id, text, question_type, difficulty, options, correct_option,
                 explanation, paragraph_id, is_ai_generated, citation)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9)
            "#,
        )
        .bind(question_id)
        .bind(&item.text)
        .bind(item.question_type)
        .bind(item.difficulty.or(rule.difficulty))
        .bind(options)
        .bind(item.correct_option)
        .bind(&item.explanation)
        .bind(paragraph_id)
        .bind(citation)
        .execute(&mut *tx)
        .await?;

        link_tags(&mut tx, question_id, rule_tag_ids).await?;

        let position = next_position(&mut tx, exam_section_id).await?;
        sqlx::query(
            r#"
            INSERT INTO section_questions
                (id, exam_section_id, question_id, marks, negative_marks, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(exam_section_id)
        .bind(question_id)
        .bind(rule.marks_per_question)
        .bind(rule.negative_marks)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(question_id)
    }

    /// Manual authoring. Optionally links the new question into an exam
    /// section with per-link marks, inside the same transaction.
    pub async fn create_question(&self, payload: CreateQuestionPayload) -> Result<Question> {
        if payload.question_type.is_mcq() {
            let options = payload
                .options
                .as_ref()
                .ok_or_else(|| Error::BadRequest("MCQ questions need options".to_string()))?;
            let correct = payload.correct_option.ok_or_else(|| {
                Error::BadRequest("MCQ questions need a correct_option".to_string())
            })?;
            if correct < 0 || correct as usize >= options.len() {
                return Err(Error::BadRequest("correct_option is out of range".to_string()));
            }
        }

        let mut tx = self.pool.begin().await?;

        let paragraph_id = match (payload.question_type, payload.paragraph_text.as_deref()) {
            (QuestionType::Paragraph, Some(content)) => {
                Some(insert_paragraph(&mut tx, content).await?)
            }
            (QuestionType::Paragraph, None) => {
                return Err(Error::BadRequest(
                    "Paragraph questions need paragraph_text".to_string(),
                ));
            }
            _ => None,
        };

        let question_id = Uuid::new_v4();
        let options = match &payload.options {
            Some(opts) => Some(serde_json::to_value(opts)?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO questions
                (id, text, translations, question_type, difficulty, options,
                 correct_option, explanation, paragraph_id, is_ai_generated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
            "#,
        )
        .bind(question_id)
        .bind(payload.text.trim())
        .bind(&payload.translations)
        .bind(payload.question_type)
        .bind(payload.difficulty)
        .bind(options)
        .bind(payload.correct_option)
        .bind(&payload.explanation)
        .bind(paragraph_id)
        .execute(&mut *tx)
        .await?;

        let tags = tag_service::upsert_tags(&mut tx, &payload.tags).await?;
        let tag_ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        link_tags(&mut tx, question_id, &tag_ids).await?;

        if let Some(link) = &payload.link {
            let marks = Decimal::from_f64(link.marks)
                .ok_or_else(|| Error::BadRequest("Invalid marks".to_string()))?;
            let negative_marks = Decimal::from_f64(link.negative_marks)
                .ok_or_else(|| Error::BadRequest("Invalid negative_marks".to_string()))?;
            let position = next_position(&mut tx, link.exam_section_id).await?;
            sqlx::query(
                r#"
                INSERT INTO section_questions
                    (id, exam_section_id, question_id, marks, negative_marks, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(link.exam_section_id)
            .bind(question_id)
            .bind(marks)
            .bind(negative_marks)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_question(question_id).await
    }

    /// Linked questions of a section in link order, with the reading passage
    /// resolved for paragraph questions.
    pub async fn questions_for_section(
        &self,
        exam_section_id: Uuid,
    ) -> Result<Vec<LinkedQuestion>> {
        let links = sqlx::query_as::<_, SectionQuestion>(
            r#"
            SELECT id, exam_section_id, question_id, marks, negative_marks, position
            FROM section_questions
            WHERE exam_section_id = $1
            ORDER BY position
            "#,
        )
        .bind(exam_section_id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = links.iter().map(|l| l.question_id).collect();
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
        ))
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;
        let questions: HashMap<Uuid, Question> =
            questions.into_iter().map(|q| (q.id, q)).collect();

        let paragraph_ids: Vec<Uuid> =
            questions.values().filter_map(|q| q.paragraph_id).collect();
        let paragraphs =
            sqlx::query_as::<_, Paragraph>("SELECT id, content FROM paragraphs WHERE id = ANY($1)")
                .bind(&paragraph_ids)
                .fetch_all(&self.pool)
                .await?;
        let paragraphs: HashMap<Uuid, Paragraph> =
            paragraphs.into_iter().map(|p| (p.id, p)).collect();

        let mut rows = Vec::with_capacity(links.len());
        for link in links {
            let Some(question) = questions.get(&link.question_id).cloned() else {
                continue;
            };
            let paragraph = question
                .paragraph_id
                .and_then(|id| paragraphs.get(&id).cloned());
            rows.push(LinkedQuestion {
                link,
                question,
                paragraph,
            });
        }
        Ok(rows)
    }

    pub async fn get_question(&self, id: Uuid) -> Result<Question> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Question not found".to_string()))
    }
}

async fn insert_paragraph(conn: &mut PgConnection, content: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO paragraphs (id, content) VALUES ($1, $2)")
        .bind(id)
        .bind(content)
        .execute(&mut *conn)
        .await?;
    Ok(id)
}

async fn link_tags(conn: &mut PgConnection, question_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT INTO question_tags (question_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(question_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Appends after the last existing link in the section.
async fn next_position(conn: &mut PgConnection, exam_section_id: Uuid) -> Result<i32> {
    let position = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM section_questions WHERE exam_section_id = $1",
    )
    .bind(exam_section_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(position)
}
