//! Answer store module
//!
//! Persistence for respondent-scoped `Answer` rows, keyed by `(respondent_id,
//! display_key)`. Every write in this module takes an open transaction so the
//! propagation engine can compose many stores/writes into one atomic `saveAnswer`.

use chrono::Utc;
use sqlx::{Postgres, Transaction};

use crate::error::AppError;
use crate::models::Answer;

/// Fields needed to insert a new Answer row. `display_key` is the rendered key;
/// `display_text` starts out equal to the raw definition text and is rebuilt by
/// the template expander immediately after insertion.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub respondent_id: i64,
    pub survey_id: i64,
    pub step_id: i64,
    pub step_instance: i64,
    pub section_id: i64,
    pub section_instance: i64,
    pub question_id: Option<i64>,
    pub question_instance: i64,
    pub section_question_id: Option<i64>,
    pub display_key: String,
    pub display_text: String,
    pub text_value: Option<String>,
}

pub async fn by_id(
    tx: &mut Transaction<'_, Postgres>,
    answer_id: i64,
) -> Result<Option<Answer>, AppError> {
    let row = sqlx::query_as::<_, Answer>("SELECT * FROM answers WHERE id = $1")
        .bind(answer_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row)
}

pub async fn by_display_key(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    display_key: &str,
    include_deleted: bool,
) -> Result<Option<Answer>, AppError> {
    let row = sqlx::query_as::<_, Answer>(
        "SELECT * FROM answers \
         WHERE respondent_id = $1 AND display_key = $2 AND (deleted = false OR $3) \
         ORDER BY deleted ASC LIMIT 1",
    )
    .bind(respondent_id)
    .bind(display_key)
    .bind(include_deleted)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

pub async fn by_section(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
    section_id: i64,
    section_instance: i64,
) -> Result<Vec<Answer>, AppError> {
    let rows = sqlx::query_as::<_, Answer>(
        "SELECT * FROM answers \
         WHERE respondent_id = $1 AND step_id = $2 AND step_instance = $3 \
           AND section_id = $4 AND section_instance = $5 AND deleted = false \
         ORDER BY display_key ASC",
    )
    .bind(respondent_id)
    .bind(step_id)
    .bind(step_instance)
    .bind(section_id)
    .bind(section_instance)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

pub async fn by_like_pattern(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    pattern: &str,
) -> Result<Vec<Answer>, AppError> {
    let rows = sqlx::query_as::<_, Answer>(
        "SELECT * FROM answers \
         WHERE respondent_id = $1 AND display_key LIKE $2 AND deleted = false \
         ORDER BY display_key ASC",
    )
    .bind(respondent_id)
    .bind(pattern)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Restricted to section-level rows (`question_id IS NULL`) matching a section-scoped
/// LIKE pattern — used to enumerate existing section instances for REPEAT.
pub async fn section_rows_by_pattern(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    pattern: &str,
) -> Result<Vec<Answer>, AppError> {
    let rows = sqlx::query_as::<_, Answer>(
        "SELECT * FROM answers \
         WHERE respondent_id = $1 AND display_key LIKE $2 \
           AND question_id IS NULL AND deleted = false \
         ORDER BY display_key ASC",
    )
    .bind(respondent_id)
    .bind(pattern)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    new_answer: NewAnswer,
) -> Result<Answer, AppError> {
    let now = Utc::now();

    let answer = sqlx::query_as::<_, Answer>(
        "INSERT INTO answers \
            (respondent_id, survey_id, step_id, step_instance, section_id, section_instance, \
             question_id, question_instance, section_question_id, display_key, display_text, \
             text_value, deleted, created_at, saved_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, false, $13, $13) \
         RETURNING *",
    )
    .bind(new_answer.respondent_id)
    .bind(new_answer.survey_id)
    .bind(new_answer.step_id)
    .bind(new_answer.step_instance)
    .bind(new_answer.section_id)
    .bind(new_answer.section_instance)
    .bind(new_answer.question_id)
    .bind(new_answer.question_instance)
    .bind(new_answer.section_question_id)
    .bind(&new_answer.display_key)
    .bind(&new_answer.display_text)
    .bind(&new_answer.text_value)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(answer)
}

pub async fn update_text_value(
    tx: &mut Transaction<'_, Postgres>,
    answer_id: i64,
    text_value: Option<&str>,
) -> Result<Answer, AppError> {
    let answer = sqlx::query_as::<_, Answer>(
        "UPDATE answers SET text_value = $2, saved_at = $3 WHERE id = $1 RETURNING *",
    )
    .bind(answer_id)
    .bind(text_value)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    Ok(answer)
}

pub async fn update_display_text(
    tx: &mut Transaction<'_, Postgres>,
    answer_id: i64,
    display_text: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE answers SET display_text = $2 WHERE id = $1")
        .bind(answer_id)
        .bind(display_text)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn soft_delete(tx: &mut Transaction<'_, Postgres>, answer_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE answers SET deleted = true WHERE id = $1")
        .bind(answer_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Revives a soft-deleted row at `display_key`, or returns `None` if no such row
/// (deleted or otherwise) exists yet.
pub async fn revive(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    display_key: &str,
) -> Result<Option<Answer>, AppError> {
    let answer = sqlx::query_as::<_, Answer>(
        "UPDATE answers SET deleted = false, saved_at = $3 \
         WHERE respondent_id = $1 AND display_key = $2 \
         RETURNING *",
    )
    .bind(respondent_id)
    .bind(display_key)
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(answer)
}

pub async fn hard_delete_where_deleted(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM answers WHERE respondent_id = $1 AND deleted = true")
        .bind(respondent_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
