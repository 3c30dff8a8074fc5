use crate::error::Result;
use crate::models::tag::Tag;
use sqlx::PgConnection;
use uuid::Uuid;

/// Upserts tags by name inside the caller's transaction. Blank names are
/// skipped; the returned tags follow the order of `names`.
pub async fn upsert_tags(conn: &mut PgConnection, names: &[String]) -> Result<Vec<Tag>> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
        tags.push(tag);
    }
    Ok(tags)
}
