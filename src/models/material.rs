use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A reference document attached to a blueprint. Its chunk rows (text +
/// embedding) are write-only from the API's point of view; retrieval reads
/// them back as similarity matches.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferenceMaterial {
    pub id: Uuid,
    pub blueprint_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}
