//! Public façade module
//!
//! The five operations external callers actually use: `init`, `navigate`,
//! `save_answer`, `finalize`, `remove_deleted`. Each acquires the calling
//! respondent's lock, opens one transaction, delegates to `propagation`, and
//! commits — so from the outside every call is atomic and every respondent's
//! calls are serialized against themselves without blocking other respondents.

use crate::error::AppError;
use crate::models::{AnswerPatch, DisplayKey, NavResponse, Respondent};
use crate::services::{propagation, respondent_store};
use crate::state::AppState;

pub async fn init(state: &AppState, respondent_id: i64, initial_display_key: &str) -> Result<(), AppError> {
    let key = DisplayKey::parse(initial_display_key)?;
    let lock = state.respondent_lock(respondent_id);
    let _guard = lock.lock().await;

    let mut tx = state.db().begin().await?;
    propagation::init(&mut tx, state.definitions(), respondent_id, &key).await?;
    tx.commit().await?;

    Ok(())
}

pub async fn navigate(state: &AppState, respondent_id: i64, section_display_key: &str) -> Result<NavResponse, AppError> {
    let key = DisplayKey::parse(section_display_key)?;
    let lock = state.respondent_lock(respondent_id);
    let _guard = lock.lock().await;

    let mut tx = state.db().begin().await?;
    let response = propagation::navigate(&mut tx, state.definitions(), respondent_id, &key).await?;
    tx.commit().await?;

    Ok(response)
}

pub async fn save_answer(state: &AppState, patch: AnswerPatch) -> Result<NavResponse, AppError> {
    let lock = state.respondent_lock(patch.respondent_id);
    let _guard = lock.lock().await;

    let mut tx = state.db().begin().await?;
    let response = propagation::save_answer(&mut tx, state.definitions(), &patch).await?;
    tx.commit().await?;

    Ok(response)
}

pub async fn finalize(state: &AppState, respondent_id: i64) -> Result<Respondent, AppError> {
    let lock = state.respondent_lock(respondent_id);
    let _guard = lock.lock().await;

    let mut tx = state.db().begin().await?;
    let respondent = respondent_store::finalize(&mut tx, respondent_id).await?;
    tx.commit().await?;

    Ok(respondent)
}

pub async fn remove_deleted(state: &AppState, respondent_id: i64) -> Result<(), AppError> {
    let lock = state.respondent_lock(respondent_id);
    let _guard = lock.lock().await;

    let mut tx = state.db().begin().await?;
    propagation::remove_deleted(&mut tx, respondent_id).await?;
    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_malformed_display_key() {
        let err = DisplayKey::parse("not-a-key").unwrap_err();
        assert!(matches!(err, AppError::MalformedKey(_)));
    }
}
