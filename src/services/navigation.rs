//! Navigation builder module
//!
//! Produces the ordered list of section-level stops in a respondent's run, with
//! `previous`/`next` links derived purely from `DisplayKey` lexical order.

use sqlx::{Postgres, Transaction};

use crate::error::AppError;
use crate::models::NavigationItem;

/// Builds the navigation list from every non-deleted, section-level Answer
/// (`question_id IS NULL`, excluding step-level placeholder rows where
/// `section_instance = 0`), ordered by `display_key`.
pub async fn build(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<Vec<NavigationItem>, AppError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT display_key, display_text FROM answers \
         WHERE respondent_id = $1 AND question_id IS NULL AND section_instance != 0 \
           AND deleted = false \
         ORDER BY display_key ASC",
    )
    .bind(respondent_id)
    .fetch_all(&mut **tx)
    .await?;

    let items = rows
        .iter()
        .enumerate()
        .map(|(i, (display_key, display_text))| NavigationItem {
            name: display_text.clone(),
            path: display_key.clone(),
            previous: (i > 0).then(|| rows[i - 1].0.clone()),
            next: (i + 1 < rows.len()).then(|| rows[i + 1].0.clone()),
        })
        .collect();

    Ok(items)
}

/// Finds the navigation item whose path matches `section_key`, if the section
/// currently has a materialized section-level answer.
pub fn current_item(items: &[NavigationItem], section_key: &str) -> Option<NavigationItem> {
    items.iter().find(|item| item.path == section_key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, previous: Option<&str>, next: Option<&str>) -> NavigationItem {
        NavigationItem {
            name: path.to_string(),
            path: path.to_string(),
            previous: previous.map(str::to_string),
            next: next.map(str::to_string),
        }
    }

    #[test]
    fn current_item_matches_by_path() {
        let items = vec![item("a", None, Some("b")), item("b", Some("a"), None)];
        assert_eq!(current_item(&items, "b"), Some(item("b", Some("a"), None)));
    }

    #[test]
    fn current_item_is_none_when_absent() {
        let items = vec![item("a", None, None)];
        assert_eq!(current_item(&items, "z"), None);
    }
}
