use crate::dto::blueprint_dto::{AddMaterialPayload, CreateBlueprintPayload};
use crate::error::{Error, Result};
use crate::models::blueprint::{Blueprint, BlueprintRule, BlueprintSection};
use crate::models::material::ReferenceMaterial;
use crate::models::tag::Tag;
use crate::services::embed_service::EmbedService;
use crate::services::tag_service;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

pub const CHUNK_MAX_CHARS: usize = 1200;

const RULE_COLUMNS: &str = "id, section_id, question_type, difficulty, number_of_questions, \
    marks_per_question, negative_marks, position";

#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleDetail {
    #[serde(flatten)]
    pub rule: BlueprintRule,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SectionDetail {
    #[serde(flatten)]
    pub section: BlueprintSection,
    pub rules: Vec<RuleDetail>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BlueprintDetail {
    #[serde(flatten)]
    pub blueprint: Blueprint,
    pub sections: Vec<SectionDetail>,
}

#[derive(Clone)]
pub struct BlueprintService {
    pool: PgPool,
}

impl BlueprintService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_blueprint(&self, payload: CreateBlueprintPayload) -> Result<BlueprintDetail> {
        let blueprint_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO blueprints (id, title, description) VALUES ($1, $2, $3)")
            .bind(blueprint_id)
            .bind(payload.title.trim())
            .bind(&payload.description)
            .execute(&mut *tx)
            .await?;

        for (section_idx, section) in payload.sections.iter().enumerate() {
            let section_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO blueprint_sections (id, blueprint_id, title, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(section_id)
            .bind(blueprint_id)
            .bind(section.title.trim())
            .bind(section_idx as i32 + 1)
            .execute(&mut *tx)
            .await?;

            for (rule_idx, rule) in section.rules.iter().enumerate() {
                let rule_id = Uuid::new_v4();
                let marks = Decimal::from_f64(rule.marks_per_question)
                    .ok_or_else(|| Error::BadRequest("Invalid marks_per_question".to_string()))?;
                let negative_marks = Decimal::from_f64(rule.negative_marks)
                    .ok_or_else(|| Error::BadRequest("Invalid negative_marks".to_string()))?;
                sqlx::query(
                    r#"
                    INSERT INTO blueprint_rules
                        (id, section_id, question_type, difficulty, number_of_questions,
                         marks_per_question, negative_marks, position)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(rule_id)
                .bind(section_id)
                .bind(rule.question_type)
                .bind(rule.difficulty)
                .bind(rule.number_of_questions)
                .bind(marks)
                .bind(negative_marks)
                .bind(rule_idx as i32 + 1)
                .execute(&mut *tx)
                .await?;

                let tags = tag_service::upsert_tags(&mut tx, &rule.topic_tags).await?;
                for tag in &tags {
                    sqlx::query(
                        "INSERT INTO rule_tags (rule_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                    )
                    .bind(rule_id)
                    .bind(tag.id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        self.get_blueprint(blueprint_id).await
    }

    pub async fn get_blueprint(&self, id: Uuid) -> Result<BlueprintDetail> {
        let blueprint = sqlx::query_as::<_, Blueprint>(
            "SELECT id, title, description, created_at, updated_at FROM blueprints WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Blueprint not found".to_string()))?;

        let sections = sqlx::query_as::<_, BlueprintSection>(
            "SELECT id, blueprint_id, title, position FROM blueprint_sections WHERE blueprint_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let section_ids: Vec<Uuid> = sections.iter().map(|s| s.id).collect();
        let rules = sqlx::query_as::<_, BlueprintRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM blueprint_rules WHERE section_id = ANY($1) ORDER BY position"
        ))
        .bind(&section_ids)
        .fetch_all(&self.pool)
        .await?;

        #[derive(FromRow)]
        struct RuleTagRow {
            rule_id: Uuid,
            id: Uuid,
            name: String,
        }
        let rule_ids: Vec<Uuid> = rules.iter().map(|r| r.id).collect();
        let tag_rows = sqlx::query_as::<_, RuleTagRow>(
            r#"
            SELECT rt.rule_id, t.id, t.name
            FROM rule_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.rule_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&rule_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags_by_rule: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags_by_rule.entry(row.rule_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }

        let mut rules_by_section: HashMap<Uuid, Vec<RuleDetail>> = HashMap::new();
        for rule in rules {
            let tags = tags_by_rule.remove(&rule.id).unwrap_or_default();
            rules_by_section
                .entry(rule.section_id)
                .or_default()
                .push(RuleDetail { rule, tags });
        }

        let sections = sections
            .into_iter()
            .map(|section| {
                let rules = rules_by_section.remove(&section.id).unwrap_or_default();
                SectionDetail { section, rules }
            })
            .collect();

        Ok(BlueprintDetail {
            blueprint,
            sections,
        })
    }

    pub async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        let blueprints = sqlx::query_as::<_, Blueprint>(
            "SELECT id, title, description, created_at, updated_at FROM blueprints ORDER BY created_at DESC LIMIT 100",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(blueprints)
    }

    /// Ingests a reference document: chunk, embed the chunks in one batch,
    /// store material + chunks transactionally.
    pub async fn add_material(
        &self,
        blueprint_id: Uuid,
        payload: AddMaterialPayload,
        embed: &EmbedService,
    ) -> Result<ReferenceMaterial> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM blueprints WHERE id = $1)",
        )
        .bind(blueprint_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(Error::NotFound("Blueprint not found".to_string()));
        }

        let chunks = chunk_text(&payload.content, CHUNK_MAX_CHARS);
        if chunks.is_empty() {
            return Err(Error::BadRequest(
                "Material content produced no chunks".to_string(),
            ));
        }
        let embeddings = embed.embed_texts(&chunks).await?;

        let mut tx = self.pool.begin().await?;
        let material = sqlx::query_as::<_, ReferenceMaterial>(
            r#"
            INSERT INTO reference_materials (id, blueprint_id, title)
            VALUES ($1, $2, $3)
            RETURNING id, blueprint_id, title, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(blueprint_id)
        .bind(payload.title.trim())
        .fetch_one(&mut *tx)
        .await?;

        for (idx, (content, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            sqlx::query(
                "INSERT INTO document_chunks (id, material_id, position, content, embedding) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(material.id)
            .bind(idx as i32)
            .bind(content)
            .bind(pgvector::Vector::from(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            material_id = %material.id,
            blueprint_id = %blueprint_id,
            chunks = chunks.len(),
            "reference material ingested"
        );
        Ok(material)
    }
}

/// Splits material text into retrieval chunks on blank-line boundaries,
/// packing paragraphs up to `max_chars` per chunk. Oversized paragraphs are
/// split hard at a char boundary.
pub fn chunk_text(content: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut rest = paragraph;
            while rest.len() > max_chars {
                let mut end = max_chars;
                while !rest.is_char_boundary(end) {
                    end -= 1;
                }
                chunks.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            if !rest.is_empty() {
                chunks.push(rest.to_string());
            }
            continue;
        }
        if !current.is_empty() && current.len() + 2 + paragraph.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_small_paragraphs_into_one_chunk() {
        let chunks = chunk_text("first paragraph\n\nsecond paragraph", 100);
        assert_eq!(chunks, vec!["first paragraph\n\nsecond paragraph"]);
    }

    #[test]
    fn starts_a_new_chunk_when_the_limit_would_be_exceeded() {
        let chunks = chunk_text("aaaa\n\nbbbb\n\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn splits_an_oversized_paragraph_hard() {
        let long = "x".repeat(25);
        let chunks = chunk_text(&long, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 10));
    }

    #[test]
    fn skips_blank_paragraphs() {
        let chunks = chunk_text("\n\n  \n\nonly content\n\n\n\n", 100);
        assert_eq!(chunks, vec!["only content"]);
    }
}
