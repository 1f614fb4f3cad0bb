//! FAQ knowledge store with per-tenant nearest-neighbor lookup.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Faq, FaqMatch, FaqRow};
use crate::vector::{cosine_distance, decode_embedding, encode_embedding};

const FAQ_COLUMNS: &str = "id, tenant_id, question, answer, embedding, created_at, updated_at";

fn faq_not_found(tenant_id: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "FAQ",
        id: format!("{tenant_id}/{id}"),
    }
}

/// Create a FAQ entry for a tenant.
pub async fn create_faq(
    pool: &SqlitePool,
    tenant_id: &str,
    question: &str,
    answer: &str,
    embedding: Option<&[f32]>,
) -> Result<Faq> {
    let row = sqlx::query_as::<_, FaqRow>(&format!(
        r#"
        INSERT INTO faqs (tenant_id, question, answer, embedding)
        VALUES (?, ?, ?, ?)
        RETURNING {FAQ_COLUMNS}
        "#
    ))
    .bind(tenant_id)
    .bind(question)
    .bind(answer)
    .bind(embedding.map(encode_embedding))
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return DatabaseError::NotFound {
                    entity: "Tenant",
                    id: tenant_id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(row.into())
}

/// Get one FAQ entry owned by `tenant_id`.
pub async fn get_faq(pool: &SqlitePool, tenant_id: &str, id: i64) -> Result<Faq> {
    sqlx::query_as::<_, FaqRow>(&format!(
        "SELECT {FAQ_COLUMNS} FROM faqs WHERE tenant_id = ? AND id = ?"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Faq::from)
    .ok_or_else(|| faq_not_found(tenant_id, id))
}

/// Page through a tenant's FAQ entries in creation order.
pub async fn list_faqs(pool: &SqlitePool, tenant_id: &str, limit: i64, offset: i64) -> Result<Vec<Faq>> {
    let rows = sqlx::query_as::<_, FaqRow>(&format!(
        r#"
        SELECT {FAQ_COLUMNS}
        FROM faqs
        WHERE tenant_id = ?
        ORDER BY id
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Faq::from).collect())
}

/// Replace the text and embedding of an entry.
///
/// Callers must pass a fresh embedding whenever the question or answer changed.
pub async fn update_faq(
    pool: &SqlitePool,
    tenant_id: &str,
    id: i64,
    question: &str,
    answer: &str,
    embedding: Option<&[f32]>,
) -> Result<Faq> {
    sqlx::query_as::<_, FaqRow>(&format!(
        r#"
        UPDATE faqs
        SET question = ?, answer = ?, embedding = ?, updated_at = datetime('now')
        WHERE tenant_id = ? AND id = ?
        RETURNING {FAQ_COLUMNS}
        "#
    ))
    .bind(question)
    .bind(answer)
    .bind(embedding.map(encode_embedding))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Faq::from)
    .ok_or_else(|| faq_not_found(tenant_id, id))
}

/// Delete an entry.
pub async fn delete_faq(pool: &SqlitePool, tenant_id: &str, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM faqs WHERE tenant_id = ? AND id = ?")
        .bind(tenant_id)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(faq_not_found(tenant_id, id));
    }

    Ok(())
}

/// Whether an identical question/answer pair is already stored for the tenant.
pub async fn faq_exists(pool: &SqlitePool, tenant_id: &str, question: &str, answer: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM faqs WHERE tenant_id = ? AND question = ? AND answer = ?)",
    )
    .bind(tenant_id)
    .bind(question)
    .bind(answer)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Count a tenant's entries.
pub async fn count_faqs(pool: &SqlitePool, tenant_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM faqs WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[derive(sqlx::FromRow)]
struct Candidate {
    id: i64,
    question: String,
    answer: String,
    embedding: Vec<u8>,
}

/// The `top_k` entries of a tenant closest to `query` by cosine distance.
///
/// Only rows of `tenant_id` with a stored embedding are considered. Results are
/// ordered by ascending distance, then by FAQ id. Rows whose dimensionality
/// differs from the query, or whose distance is not finite, are skipped.
pub async fn query_nearest_faqs(
    pool: &SqlitePool,
    tenant_id: &str,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<FaqMatch>> {
    if top_k == 0 || query.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = sqlx::query_as::<_, Candidate>(
        r#"
        SELECT id, question, answer, embedding
        FROM faqs
        WHERE tenant_id = ? AND embedding IS NOT NULL
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    let mut matches: Vec<FaqMatch> = candidates
        .into_iter()
        .filter_map(|c| {
            let stored = decode_embedding(&c.embedding)?;
            let Some(distance) = cosine_distance(query, &stored) else {
                tracing::warn!(
                    faq_id = c.id,
                    stored_dims = stored.len(),
                    query_dims = query.len(),
                    "Skipping FAQ with mismatched or non-finite embedding"
                );
                return None;
            };
            Some(FaqMatch {
                id: c.id,
                question: c.question,
                answer: c.answer,
                distance,
            })
        })
        .collect();

    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
    matches.truncate(top_k);

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTenant;
    use crate::{tenant, Database};

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        for (id, phone) in [("a", "1"), ("b", "2")] {
            tenant::create_tenant(
                db.pool(),
                &NewTenant {
                    id: id.to_string(),
                    phone_id: phone.to_string(),
                    wh_token: "token".to_string(),
                    system_prompt: None,
                },
            )
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_faq_crud() {
        let db = test_db().await;
        let faq = create_faq(db.pool(), "a", "Hours?", "9 to 5", Some(&[1.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(faq.embedding, Some(vec![1.0, 0.0]));

        let updated = update_faq(db.pool(), "a", faq.id, "Hours?", "10 to 6", None)
            .await
            .unwrap();
        assert_eq!(updated.answer, "10 to 6");
        assert!(!updated.has_embedding());

        // Another tenant cannot see or touch the entry.
        assert!(get_faq(db.pool(), "b", faq.id).await.unwrap_err().is_not_found());
        assert!(delete_faq(db.pool(), "b", faq.id).await.unwrap_err().is_not_found());

        assert_eq!(list_faqs(db.pool(), "a", 10, 0).await.unwrap().len(), 1);
        delete_faq(db.pool(), "a", faq.id).await.unwrap();
        assert_eq!(count_faqs(db.pool(), "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_for_unknown_tenant() {
        let db = test_db().await;
        let err = create_faq(db.pool(), "ghost", "q", "a", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_nearest_ranking_and_top_k() {
        let db = test_db().await;
        // Distances from [1, 0]: far = 1.0, mid ~ 0.29, near = 0.0
        let far = create_faq(db.pool(), "a", "far", "x", Some(&[0.0, 1.0])).await.unwrap();
        let near = create_faq(db.pool(), "a", "near", "x", Some(&[1.0, 0.0])).await.unwrap();
        let mid = create_faq(db.pool(), "a", "mid", "x", Some(&[1.0, 1.0])).await.unwrap();

        let hits = query_nearest_faqs(db.pool(), "a", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![near.id, mid.id]);
        assert!(hits[0].distance < hits[1].distance);
        assert!(!ids.contains(&far.id));
    }

    #[tokio::test]
    async fn test_nearest_excludes_null_and_other_tenants() {
        let db = test_db().await;
        create_faq(db.pool(), "a", "unembedded", "x", None).await.unwrap();
        create_faq(db.pool(), "b", "exact match", "x", Some(&[1.0, 0.0])).await.unwrap();
        let own = create_faq(db.pool(), "a", "own", "x", Some(&[0.0, 1.0])).await.unwrap();

        let hits = query_nearest_faqs(db.pool(), "a", &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, own.id);
    }

    #[tokio::test]
    async fn test_equal_distances_break_on_id() {
        let db = test_db().await;
        let first = create_faq(db.pool(), "a", "one", "x", Some(&[1.0, 0.0])).await.unwrap();
        let second = create_faq(db.pool(), "a", "two", "x", Some(&[2.0, 0.0])).await.unwrap();

        let hits = query_nearest_faqs(db.pool(), "a", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].id, first.id);
        assert_eq!(hits[1].id, second.id);
    }

    #[tokio::test]
    async fn test_non_finite_embeddings_are_skipped() {
        let db = test_db().await;
        let broken = create_faq(db.pool(), "a", "Broken?", "nan", Some(&[f32::NAN, 1.0]))
            .await
            .unwrap();
        let far = create_faq(db.pool(), "a", "Far?", "far", Some(&[0.0, 1.0])).await.unwrap();
        let near = create_faq(db.pool(), "a", "Near?", "near", Some(&[1.0, 0.1])).await.unwrap();

        let hits = query_nearest_faqs(db.pool(), "a", &[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![near.id, far.id]);
        assert!(!ids.contains(&broken.id));
        assert!(hits.iter().all(|h| h.distance.is_finite()));
    }

    #[tokio::test]
    async fn test_faq_exists() {
        let db = test_db().await;
        create_faq(db.pool(), "a", "q", "ans", None).await.unwrap();
        assert!(faq_exists(db.pool(), "a", "q", "ans").await.unwrap());
        assert!(!faq_exists(db.pool(), "b", "q", "ans").await.unwrap());
    }
}
