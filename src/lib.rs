pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    ai_service::AiService, blueprint_service::BlueprintService, embed_service::EmbedService,
    exam_service::ExamService, generation_service::GenerationService,
    question_service::QuestionService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub blueprint_service: BlueprintService,
    pub exam_service: ExamService,
    pub question_service: QuestionService,
    pub embed_service: EmbedService,
    pub ai_service: AiService,
    pub generation_service: GenerationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let blueprint_service = BlueprintService::new(pool.clone());
        let exam_service = ExamService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let embed_service = EmbedService::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            http_client.clone(),
        );
        let ai_service = AiService::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            http_client,
            Duration::from_secs(config.ai_timeout_secs),
            config.ai_max_retries,
        );
        let generation_service = GenerationService::new(
            pool.clone(),
            embed_service.clone(),
            ai_service.clone(),
            config.max_questions_per_rule,
        );

        Self {
            pool,
            blueprint_service,
            exam_service,
            question_service,
            embed_service,
            ai_service,
            generation_service,
        }
    }
}
