//! Navigation view: the ordered list of section-level stops in a respondent's run,
//! and the response shape returned by `navigate`/`saveAnswer`.

use serde::{Deserialize, Serialize};

use crate::models::answer::Answer;

/// One stop in the navigation list, derived from a section-level Answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub name: String,
    pub path: String,
    pub previous: Option<String>,
    pub next: Option<String>,
}

/// The response shape of `navigate` and `saveAnswer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavResponse {
    pub step: String,
    pub current_nav_item: Option<NavigationItem>,
    pub answers: Vec<Answer>,
    pub nav_items: Vec<NavigationItem>,
}
