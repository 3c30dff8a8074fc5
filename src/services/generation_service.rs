use crate::dto::exam_dto::ShortageRow;
use crate::error::{Error, Result};
use crate::models::blueprint::BlueprintRule;
use crate::models::exam::ExamSection;
use crate::models::question::QuestionType;
use crate::services::ai_service::{join_topics, AiService, RuleRequest};
use crate::services::blueprint_service::{BlueprintService, SectionDetail};
use crate::services::embed_service::EmbedService;
use crate::services::exam_service::ExamService;
use crate::services::question_service::QuestionService;
use crate::services::retrieval_service::RetrievalService;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub const CITATION_RAG: &str = "AI Synthesized RAG";
pub const CITATION_INTERNAL: &str = "AI Internal Knowledge Base";

/// Per-rule pipeline failure, tagged with the stage that broke. A failed rule
/// never aborts the exam-wide run.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("shortage computation failed: {0}")]
    Shortage(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl RuleError {
    pub fn stage(&self) -> &'static str {
        match self {
            RuleError::Shortage(_) => "shortage",
            RuleError::Embedding(_) => "embedding",
            RuleError::Retrieval(_) => "retrieving",
            RuleError::Generation(_) => "generating",
            RuleError::Parse(_) => "parsing",
            RuleError::Persistence(_) => "persisting",
        }
    }
}

#[derive(Debug)]
pub struct RuleFailure {
    pub section_position: i32,
    pub section_title: String,
    pub rule_id: Uuid,
    pub error: RuleError,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub generated_count: i64,
    pub failures: Vec<RuleFailure>,
}

struct RuleOutcome {
    persisted: usize,
    error: Option<RuleError>,
}

impl RuleOutcome {
    fn failed(persisted: usize, error: RuleError) -> Self {
        Self {
            persisted,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct GenerationService {
    blueprints: BlueprintService,
    exams: ExamService,
    questions: QuestionService,
    retrieval: RetrievalService,
    embed: EmbedService,
    ai: AiService,
    max_questions_per_rule: usize,
}

impl GenerationService {
    pub fn new(
        pool: PgPool,
        embed: EmbedService,
        ai: AiService,
        max_questions_per_rule: usize,
    ) -> Self {
        Self {
            blueprints: BlueprintService::new(pool.clone()),
            exams: ExamService::new(pool.clone()),
            questions: QuestionService::new(pool.clone()),
            retrieval: RetrievalService::new(pool),
            embed,
            ai,
            max_questions_per_rule,
        }
    }

    /// Fills every deficient blueprint rule of an exam with AI-generated
    /// questions. Rules are independent: a failure in one is recorded and the
    /// walk continues, so the report carries a partial count plus the failed
    /// rules. Only a missing exam or missing blueprint linkage aborts before
    /// any work begins.
    pub async fn generate_missing(&self, exam_id: Uuid) -> Result<GenerationReport> {
        let exam = self.exams.get_exam(exam_id).await?;
        let blueprint_id = exam
            .blueprint_id
            .ok_or_else(|| Error::BadRequest("Exam has no linked blueprint".to_string()))?;
        let blueprint = self.blueprints.get_blueprint(blueprint_id).await?;
        let exam_sections = self.exams.sections_for_exam(exam_id).await?;
        let sections_by_blueprint: HashMap<Uuid, &ExamSection> = exam_sections
            .iter()
            .map(|s| (s.blueprint_section_id, s))
            .collect();

        let mut report = GenerationReport::default();
        for section in &blueprint.sections {
            let Some(exam_section) = sections_by_blueprint.get(&section.section.id) else {
                tracing::warn!(
                    blueprint_section_id = %section.section.id,
                    "exam has no section for this blueprint section, skipping"
                );
                continue;
            };

            for rule in &section.rules {
                let tag_ids: Vec<Uuid> = rule.tags.iter().map(|t| t.id).collect();
                let tag_names: Vec<String> = rule.tags.iter().map(|t| t.name.clone()).collect();

                let linked = match self
                    .questions
                    .count_matching_linked(exam_section.id, &rule.rule, &tag_ids)
                    .await
                {
                    Ok(count) => count,
                    Err(e) => {
                        push_failure(&mut report, section, &rule.rule, RuleError::Shortage(e.to_string()));
                        continue;
                    }
                };

                let shortage = i64::from(rule.rule.number_of_questions) - linked;
                if shortage <= 0 {
                    tracing::debug!(rule_id = %rule.rule.id, linked, "rule already satisfied, skipping");
                    continue;
                }

                let count = (shortage as usize).min(self.max_questions_per_rule);
                if count < shortage as usize {
                    tracing::warn!(
                        rule_id = %rule.rule.id,
                        shortage,
                        capped_to = count,
                        "shortage exceeds per-rule cap"
                    );
                }

                let outcome = self
                    .run_rule(blueprint_id, exam_section, &rule.rule, &tag_ids, &tag_names, count)
                    .await;
                report.generated_count += outcome.persisted as i64;
                if let Some(error) = outcome.error {
                    tracing::warn!(
                        rule_id = %rule.rule.id,
                        stage = error.stage(),
                        error = %error,
                        "rule generation failed"
                    );
                    push_failure(&mut report, section, &rule.rule, error);
                }
            }
        }

        tracing::info!(
            exam_id = %exam_id,
            generated = report.generated_count,
            failed_rules = report.failures.len(),
            "generation run finished"
        );
        Ok(report)
    }

    /// The per-rule pipeline: embed the rule description, retrieve context
    /// when the blueprint has materials, generate, parse, persist each
    /// question in its own transaction.
    async fn run_rule(
        &self,
        blueprint_id: Uuid,
        exam_section: &ExamSection,
        rule: &BlueprintRule,
        tag_ids: &[Uuid],
        tag_names: &[String],
        count: usize,
    ) -> RuleOutcome {
        let description = rule_description(rule.question_type, rule.difficulty, tag_names);
        let embedding = match self.embed.embed_text(&description).await {
            Ok(v) => v,
            Err(e) => return RuleOutcome::failed(0, RuleError::Embedding(e.to_string())),
        };

        let context = match self.retrieve_context(blueprint_id, &embedding).await {
            Ok(c) => c,
            Err(e) => return RuleOutcome::failed(0, RuleError::Retrieval(e.to_string())),
        };
        let citation = if context.is_empty() {
            CITATION_INTERNAL
        } else {
            CITATION_RAG
        };

        let request = RuleRequest {
            question_type: rule.question_type,
            difficulty: rule.difficulty,
            topics: tag_names,
            count,
            context: &context,
        };
        let items = match self.ai.generate_questions(&request).await {
            Ok(v) => v,
            Err(Error::GenerationParse(msg)) => {
                return RuleOutcome::failed(0, RuleError::Parse(msg))
            }
            Err(e) => return RuleOutcome::failed(0, RuleError::Generation(e.to_string())),
        };

        let mut persisted = 0usize;
        for item in &items {
            match self
                .questions
                .insert_generated(exam_section.id, rule, tag_ids, citation, item)
                .await
            {
                Ok(question_id) => {
                    persisted += 1;
                    tracing::debug!(
                        question_id = %question_id,
                        rule_id = %rule.id,
                        citation,
                        "generated question linked"
                    );
                }
                Err(e) => {
                    return RuleOutcome::failed(persisted, RuleError::Persistence(e.to_string()))
                }
            }
        }
        RuleOutcome {
            persisted,
            error: None,
        }
    }

    async fn retrieve_context(&self, blueprint_id: Uuid, embedding: &[f32]) -> Result<String> {
        if !self.retrieval.has_materials(blueprint_id).await? {
            return Ok(String::new());
        }
        let chunks = self.retrieval.top_chunks(blueprint_id, embedding).await?;
        Ok(RetrievalService::build_context(&chunks))
    }

    /// Read-only shortage report for an exam, one row per blueprint rule that
    /// has a matching exam section.
    pub async fn compute_shortages(&self, exam_id: Uuid) -> Result<Vec<ShortageRow>> {
        let exam = self.exams.get_exam(exam_id).await?;
        let blueprint_id = exam
            .blueprint_id
            .ok_or_else(|| Error::BadRequest("Exam has no linked blueprint".to_string()))?;
        let blueprint = self.blueprints.get_blueprint(blueprint_id).await?;
        let exam_sections = self.exams.sections_for_exam(exam_id).await?;
        let sections_by_blueprint: HashMap<Uuid, &ExamSection> = exam_sections
            .iter()
            .map(|s| (s.blueprint_section_id, s))
            .collect();

        let mut rows = Vec::new();
        for section in &blueprint.sections {
            let Some(exam_section) = sections_by_blueprint.get(&section.section.id) else {
                continue;
            };
            for rule in &section.rules {
                let tag_ids: Vec<Uuid> = rule.tags.iter().map(|t| t.id).collect();
                let linked = self
                    .questions
                    .count_matching_linked(exam_section.id, &rule.rule, &tag_ids)
                    .await?;
                rows.push(ShortageRow {
                    section_id: exam_section.id,
                    section_title: exam_section.title.clone(),
                    rule_id: rule.rule.id,
                    question_type: rule.rule.question_type,
                    required: rule.rule.number_of_questions,
                    linked,
                    shortage: shortage_for(rule.rule.number_of_questions, linked),
                });
            }
        }
        Ok(rows)
    }
}

fn push_failure(
    report: &mut GenerationReport,
    section: &SectionDetail,
    rule: &BlueprintRule,
    error: RuleError,
) {
    report.failures.push(RuleFailure {
        section_position: section.section.position,
        section_title: section.section.title.clone(),
        rule_id: rule.id,
        error,
    });
}

pub fn shortage_for(required: i32, linked: i64) -> i64 {
    i64::from(required) - linked
}

/// The retrieval query text for a rule. Kept short: the embedding of this
/// sentence is what selects reference chunks.
pub fn rule_description(
    question_type: QuestionType,
    difficulty: Option<i32>,
    topics: &[String],
) -> String {
    let difficulty = difficulty
        .map(|d| d.to_string())
        .unwrap_or_else(|| "medium".to_string());
    format!(
        "Generate a {} question about {}. Difficulty level: {}.",
        question_type,
        join_topics(topics),
        difficulty
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortage_is_required_minus_linked() {
        assert_eq!(shortage_for(5, 2), 3);
        assert_eq!(shortage_for(5, 5), 0);
        assert_eq!(shortage_for(5, 7), -2);
    }

    #[test]
    fn description_uses_medium_when_difficulty_is_unset() {
        let topics = vec!["Algebra".to_string()];
        assert_eq!(
            rule_description(QuestionType::McqSingle, None, &topics),
            "Generate a mcq_single question about Algebra. Difficulty level: medium."
        );
    }

    #[test]
    fn description_names_the_exact_difficulty() {
        let topics = vec!["Algebra".to_string(), "Geometry".to_string()];
        assert_eq!(
            rule_description(QuestionType::TrueFalse, Some(3), &topics),
            "Generate a true_false question about Algebra, Geometry. Difficulty level: 3."
        );
    }

    #[test]
    fn citation_constants_match_the_provenance_contract() {
        assert_eq!(CITATION_RAG, "AI Synthesized RAG");
        assert_eq!(CITATION_INTERNAL, "AI Internal Knowledge Base");
    }

    #[test]
    fn rule_error_stages_follow_the_pipeline_states() {
        assert_eq!(RuleError::Shortage("x".into()).stage(), "shortage");
        assert_eq!(RuleError::Embedding("x".into()).stage(), "embedding");
        assert_eq!(RuleError::Retrieval("x".into()).stage(), "retrieving");
        assert_eq!(RuleError::Generation("x".into()).stage(), "generating");
        assert_eq!(RuleError::Parse("x".into()).stage(), "parsing");
        assert_eq!(RuleError::Persistence("x".into()).stage(), "persisting");
    }
}
