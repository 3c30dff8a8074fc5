use crate::error::Result;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub const RETRIEVAL_TOP_K: i64 = 15;
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, FromRow)]
pub struct ChunkMatch {
    pub content: String,
    pub similarity: f64,
}

#[derive(Clone)]
pub struct RetrievalService {
    pool: PgPool,
}

impl RetrievalService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn has_materials(&self, blueprint_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reference_materials WHERE blueprint_id = $1)",
        )
        .bind(blueprint_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Top-K chunks across this blueprint's materials, most similar first.
    /// Similarity is `1 - cosine_distance`.
    pub async fn top_chunks(
        &self,
        blueprint_id: Uuid,
        embedding: &[f32],
    ) -> Result<Vec<ChunkMatch>> {
        let query_vector = pgvector::Vector::from(embedding.to_vec());
        let chunks = sqlx::query_as::<_, ChunkMatch>(
            r#"
            SELECT dc.content, 1 - (dc.embedding <=> $1) AS similarity
            FROM document_chunks dc
            JOIN reference_materials rm ON rm.id = dc.material_id
            WHERE rm.blueprint_id = $2
            ORDER BY dc.embedding <=> $1
            LIMIT $3
            "#,
        )
        .bind(query_vector)
        .bind(blueprint_id)
        .bind(RETRIEVAL_TOP_K)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    pub fn build_context(chunks: &[ChunkMatch]) -> String {
        chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, similarity: f64) -> ChunkMatch {
        ChunkMatch {
            content: content.to_string(),
            similarity,
        }
    }

    #[test]
    fn context_joins_chunks_with_separator() {
        let chunks = vec![chunk("first", 0.9), chunk("second", 0.8)];
        assert_eq!(
            RetrievalService::build_context(&chunks),
            "first\n---\nsecond"
        );
    }

    #[test]
    fn context_is_empty_without_chunks() {
        assert_eq!(RetrievalService::build_context(&[]), "");
    }
}
