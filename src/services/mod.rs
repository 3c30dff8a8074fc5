pub mod ai_service;
pub mod blueprint_service;
pub mod embed_service;
pub mod exam_service;
pub mod generation_service;
pub mod question_service;
pub mod retrieval_service;
pub mod tag_service;
