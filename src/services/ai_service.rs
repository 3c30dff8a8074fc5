use crate::dto::generation_dto::GeneratedQuestion;
use crate::error::{Error, Result};
use crate::models::question::QuestionType;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

pub const GENERATION_MODEL: &str = "gpt-4o";

const GENERATION_SYSTEM_PROMPT: &str = r#"You are an exam content author for a computer-based entrance examination.
Generate assessment questions that match the requested topic, type and difficulty exactly.

Rules:
1. Respond with a single JSON array and nothing else. No prose, no markdown fences.
2. Each element is an object with fields:
   - "text": the question text
   - "type": the requested question type, verbatim
   - "options": array of exactly 4 distinct answer options (multiple-choice types only)
   - "correct_option": 0-based index of the correct option (multiple-choice types only)
   - "difficulty": integer difficulty level of the question
   - "explanation": a short rationale for the correct answer
   - "paragraph_text": the reading passage (type "paragraph" only)
3. Return exactly the requested number of elements. Never more, never fewer.
4. Options must be plausible and non-repetitive. Avoid "All of the above" or "None of the above".
5. CRITICAL: vary the correct_option index across questions. Do NOT always use 0.
"#;

/// Everything the generator needs to produce one rule's batch.
#[derive(Debug, Clone)]
pub struct RuleRequest<'a> {
    pub question_type: QuestionType,
    pub difficulty: Option<i32>,
    pub topics: &'a [String],
    pub count: usize,
    pub context: &'a str,
}

#[derive(Clone)]
pub struct AiService {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl AiService {
    pub fn new(
        api_key: String,
        base_url: String,
        client: Client,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
        }
    }

    /// Requests exactly `request.count` questions and rejects anything else:
    /// malformed JSON, a count mismatch, or a schema violation all fail the
    /// whole batch.
    pub async fn generate_questions(
        &self,
        request: &RuleRequest<'_>,
    ) -> Result<Vec<GeneratedQuestion>> {
        let payload = serde_json::json!({
            "model": GENERATION_MODEL,
            "messages": [
                {"role": "system", "content": GENERATION_SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(request)}
            ],
            "temperature": 0.7
        });

        let content = self.chat(payload).await?;
        parse_generated_batch(&content, request.count, request.question_type)
    }

    async fn chat(&self, payload: JsonValue) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt - 1))).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body: JsonValue = resp.json().await.unwrap_or(JsonValue::Null);
                        return extract_content(&body);
                    }
                    let text = resp.text().await.unwrap_or_default();
                    last_error =
                        Some(anyhow::anyhow!("completion API status {}: {}", status, text).into());
                    // 4xx other than throttling will not get better on retry
                    if status.is_client_error() && status.as_u16() != 429 {
                        break;
                    }
                }
                Err(err) => {
                    last_error = Some(Error::Reqwest(err));
                }
            }
            tracing::warn!(attempt, "generation model call failed");
        }

        Err(last_error
            .unwrap_or_else(|| Error::Internal("completion call produced no response".to_string())))
    }
}

fn extract_content(body: &JsonValue) -> Result<String> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response format").into())
}

pub fn build_user_prompt(request: &RuleRequest<'_>) -> String {
    let difficulty = request
        .difficulty
        .map(|d| d.to_string())
        .unwrap_or_else(|| "medium".to_string());
    let mut prompt = format!(
        "Generate {} {} question(s) about {}. Difficulty level: {}.",
        request.count,
        request.question_type,
        join_topics(request.topics),
        difficulty,
    );
    if request.context.is_empty() {
        prompt.push_str(
            "\n\nNo reference material is available. Rely on your general knowledge of the topic.",
        );
    } else {
        prompt.push_str("\n\nBase the questions strictly on the following reference material:\n\n");
        prompt.push_str(request.context);
    }
    prompt
}

pub(crate) fn join_topics(topics: &[String]) -> String {
    if topics.is_empty() {
        "general topics".to_string()
    } else {
        topics.join(", ")
    }
}

/// Strips an optional markdown code fence (with or without a language tag)
/// from around the model output.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}

/// Parses the model output as a strict JSON array of exactly `expected`
/// questions of the requested type. Failures are hard failures for the batch;
/// nothing is repaired, truncated or padded.
pub fn parse_generated_batch(
    raw: &str,
    expected: usize,
    question_type: QuestionType,
) -> Result<Vec<GeneratedQuestion>> {
    let cleaned = strip_code_fence(raw);
    let items: Vec<GeneratedQuestion> = serde_json::from_str(cleaned).map_err(|e| {
        Error::GenerationParse(format!("model output is not a valid question array: {}", e))
    })?;

    if items.len() != expected {
        return Err(Error::GenerationParse(format!(
            "requested {} questions, model returned {}",
            expected,
            items.len()
        )));
    }

    for (idx, item) in items.iter().enumerate() {
        validate_generated(item, question_type)
            .map_err(|msg| Error::GenerationParse(format!("question {}: {}", idx, msg)))?;
    }

    Ok(items)
}

fn validate_generated(
    item: &GeneratedQuestion,
    requested: QuestionType,
) -> std::result::Result<(), String> {
    if item.text.trim().is_empty() {
        return Err("empty question text".to_string());
    }
    if item.question_type != requested {
        return Err(format!(
            "type {} does not match requested {}",
            item.question_type, requested
        ));
    }
    if requested.is_mcq() {
        let options = item.options.as_ref().ok_or("missing options")?;
        if options.len() != 4 {
            return Err(format!("expected 4 options, got {}", options.len()));
        }
        let correct = item.correct_option.ok_or("missing correct_option")?;
        if !(0..4).contains(&correct) {
            return Err(format!("correct_option {} out of range", correct));
        }
    }
    if requested == QuestionType::Paragraph {
        match item.paragraph_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {}
            _ => return Err("missing paragraph_text".to_string()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_batch(count: usize) -> String {
        let items: Vec<JsonValue> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "text": format!("Question {}", i),
                    "type": "mcq_single",
                    "options": ["a", "b", "c", "d"],
                    "correct_option": i % 4,
                    "difficulty": 3,
                    "explanation": "because"
                })
            })
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    #[test]
    fn parses_a_valid_batch() {
        let batch = parse_generated_batch(&mcq_batch(3), 3, QuestionType::McqSingle).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].question_type, QuestionType::McqSingle);
    }

    #[test]
    fn parses_a_fenced_batch() {
        let fenced = format!("```json\n{}\n```", mcq_batch(2));
        let batch = parse_generated_batch(&fenced, 2, QuestionType::McqSingle).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn strip_code_fence_leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("  [1, 2]  "), "[1, 2]");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_generated_batch("not json at all", 1, QuestionType::McqSingle).unwrap_err();
        assert!(matches!(err, Error::GenerationParse(_)));
    }

    #[test]
    fn rejects_count_mismatch_instead_of_truncating() {
        let err = parse_generated_batch(&mcq_batch(5), 3, QuestionType::McqSingle).unwrap_err();
        let Error::GenerationParse(msg) = err else {
            panic!("expected a parse error");
        };
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("returned 5"));
    }

    #[test]
    fn rejects_mcq_without_four_options() {
        let raw = r#"[{"text": "q", "type": "mcq_single", "options": ["a", "b"], "correct_option": 0}]"#;
        let err = parse_generated_batch(raw, 1, QuestionType::McqSingle).unwrap_err();
        assert!(matches!(err, Error::GenerationParse(_)));
    }

    #[test]
    fn rejects_out_of_range_correct_option() {
        let raw = r#"[{"text": "q", "type": "mcq_single", "options": ["a", "b", "c", "d"], "correct_option": 7}]"#;
        let err = parse_generated_batch(raw, 1, QuestionType::McqSingle).unwrap_err();
        assert!(matches!(err, Error::GenerationParse(_)));
    }

    #[test]
    fn rejects_type_drift() {
        let raw = r#"[{"text": "q", "type": "true_false"}]"#;
        let err = parse_generated_batch(raw, 1, QuestionType::Paragraph).unwrap_err();
        assert!(matches!(err, Error::GenerationParse(_)));
    }

    #[test]
    fn rejects_paragraph_without_passage() {
        let raw = r#"[{"text": "q", "type": "paragraph"}]"#;
        let err = parse_generated_batch(raw, 1, QuestionType::Paragraph).unwrap_err();
        assert!(matches!(err, Error::GenerationParse(_)));
    }

    #[test]
    fn prompt_states_general_knowledge_fallback_without_context() {
        let topics = vec!["Algebra".to_string()];
        let request = RuleRequest {
            question_type: QuestionType::McqSingle,
            difficulty: Some(3),
            topics: &topics,
            count: 3,
            context: "",
        };
        let prompt = build_user_prompt(&request);
        assert!(prompt.starts_with(
            "Generate 3 mcq_single question(s) about Algebra. Difficulty level: 3."
        ));
        assert!(prompt.contains("general knowledge"));
        assert!(!prompt.contains("reference material:\n"));
    }

    #[test]
    fn prompt_embeds_retrieved_context_when_present() {
        let topics = vec!["Optics".to_string(), "Waves".to_string()];
        let request = RuleRequest {
            question_type: QuestionType::TrueFalse,
            difficulty: None,
            topics: &topics,
            count: 1,
            context: "Light bends at interfaces.",
        };
        let prompt = build_user_prompt(&request);
        assert!(prompt.contains("about Optics, Waves. Difficulty level: medium."));
        assert!(prompt.contains("Light bends at interfaces."));
        assert!(!prompt.contains("general knowledge"));
    }

    #[test]
    fn empty_topic_set_falls_back_to_generic_wording() {
        assert_eq!(join_topics(&[]), "general topics");
    }
}
