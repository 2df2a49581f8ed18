//! Respondent-scoped identity. Respondents are created by an external token/identity
//! collaborator; the engine only reads and finalizes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Respondent {
    pub id: i64,
    pub survey_id: i64,
    pub token: String,
    pub active: bool,
    pub logins: i32,
    pub created_at: DateTime<Utc>,
    pub first_access_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}
