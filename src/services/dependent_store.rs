//! Dependent store module
//!
//! Persistence for `Dependent` edges: the record of why a downstream Answer exists.
//! Uniqueness is `(respondent_id, upstream_answer_id, downstream_answer_id,
//! relationship_id)`; a recurring edge revives a soft-deleted row rather than
//! inserting a duplicate.

use sqlx::{Postgres, Transaction};

use crate::error::AppError;
use crate::models::Dependent;

pub async fn by_upstream(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    upstream_answer_id: i64,
) -> Result<Vec<Dependent>, AppError> {
    let rows = sqlx::query_as::<_, Dependent>(
        "SELECT * FROM dependents \
         WHERE respondent_id = $1 AND upstream_answer_id = $2 AND deleted = false",
    )
    .bind(respondent_id)
    .bind(upstream_answer_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

pub async fn by_downstream(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    downstream_answer_id: i64,
) -> Result<Vec<Dependent>, AppError> {
    let rows = sqlx::query_as::<_, Dependent>(
        "SELECT * FROM dependents \
         WHERE respondent_id = $1 AND downstream_answer_id = $2 AND deleted = false",
    )
    .bind(respondent_id)
    .bind(downstream_answer_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

pub async fn find_unique(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    upstream_answer_id: i64,
    downstream_answer_id: i64,
    relationship_id: i64,
) -> Result<Option<Dependent>, AppError> {
    let row = sqlx::query_as::<_, Dependent>(
        "SELECT * FROM dependents \
         WHERE respondent_id = $1 AND upstream_answer_id = $2 \
           AND downstream_answer_id = $3 AND relationship_id = $4",
    )
    .bind(respondent_id)
    .bind(upstream_answer_id)
    .bind(downstream_answer_id)
    .bind(relationship_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Inserts a new edge, or revives a matching soft-deleted one. Never creates a
/// second row for the same `(respondent, upstream, downstream, relationship)` tuple.
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    upstream_answer_id: i64,
    downstream_answer_id: i64,
    relationship_id: i64,
) -> Result<Dependent, AppError> {
    if let Some(existing) =
        find_unique(tx, respondent_id, upstream_answer_id, downstream_answer_id, relationship_id)
            .await?
    {
        if !existing.deleted {
            return Ok(existing);
        }
        let revived = sqlx::query_as::<_, Dependent>(
            "UPDATE dependents SET deleted = false WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(&mut **tx)
        .await?;
        return Ok(revived);
    }

    let inserted = sqlx::query_as::<_, Dependent>(
        "INSERT INTO dependents \
            (respondent_id, upstream_answer_id, downstream_answer_id, relationship_id, deleted) \
         VALUES ($1, $2, $3, $4, false) \
         RETURNING *",
    )
    .bind(respondent_id)
    .bind(upstream_answer_id)
    .bind(downstream_answer_id)
    .bind(relationship_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(inserted)
}

pub async fn soft_delete(tx: &mut Transaction<'_, Postgres>, dependent_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE dependents SET deleted = true WHERE id = $1")
        .bind(dependent_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn soft_delete_by_downstream(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    downstream_answer_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE dependents SET deleted = true \
         WHERE respondent_id = $1 AND downstream_answer_id = $2",
    )
    .bind(respondent_id)
    .bind(downstream_answer_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn hard_delete_where_deleted(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM dependents WHERE respondent_id = $1 AND deleted = true")
        .bind(respondent_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
