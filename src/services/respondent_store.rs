//! Respondent store module
//!
//! Thin persistence for the `Respondent` row itself. Respondents are created by
//! an external identity/token collaborator; this module only reads and finalizes.

use chrono::Utc;
use sqlx::{Postgres, Transaction};

use crate::error::AppError;
use crate::models::Respondent;

pub async fn by_id(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<Option<Respondent>, AppError> {
    let row = sqlx::query_as::<_, Respondent>("SELECT * FROM respondents WHERE id = $1")
        .bind(respondent_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row)
}

/// Sets `active = false` and stamps `finalized_at` if not already set. Idempotent:
/// calling this twice leaves the first `finalized_at` timestamp untouched.
pub async fn finalize(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<Respondent, AppError> {
    let respondent = sqlx::query_as::<_, Respondent>(
        "UPDATE respondents \
         SET active = false, finalized_at = COALESCE(finalized_at, $2) \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(respondent_id)
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::UnknownRespondent(respondent_id))?;

    Ok(respondent)
}
