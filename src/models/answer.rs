//! Respondent answers: the mutable heart of the engine's persisted state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::display_key::DisplayKey;

/// A persisted answer row, keyed by (respondent, display_key).
///
/// `display_key` is stored as its rendered dash-separated string form; callers
/// needing the structured key call [`Answer::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: i64,
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
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl Answer {
    pub fn key(&self) -> Result<DisplayKey, AppError> {
        DisplayKey::parse(&self.display_key)
    }

    pub fn is_section_level(&self) -> bool {
        self.question_id.is_none()
    }

    pub fn is_step_level(&self) -> bool {
        self.section_instance == 0 && self.question_id.is_none()
    }
}

/// An inbound request to change an existing Answer's value. References the Answer by
/// (respondentId, displayKey); the engine never accepts a client-generated Answer id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPatch {
    pub respondent_id: i64,
    pub display_key: String,
    pub text_value: Option<String>,
}
