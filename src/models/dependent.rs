//! Dependent edges: the persisted record of *why* a downstream answer exists.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An edge `upstream -> downstream` created because `relationship`'s operator
/// evaluated true against `upstream` at the time of insertion. Uniqueness is
/// (respondent, upstream, downstream, relationship); soft-deleted rows are revived
/// rather than duplicated when the same edge recurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Dependent {
    pub id: i64,
    pub respondent_id: i64,
    pub upstream_answer_id: i64,
    pub downstream_answer_id: i64,
    pub relationship_id: i64,
    pub deleted: bool,
}
