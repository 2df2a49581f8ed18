//! Survey definition entities: the static schema a survey is built from.
//!
//! These are read-only from the engine's perspective (see `services::definition_store`)
//! and, once loaded into a `DefinitionSnapshot`, are treated as immutable for the
//! lifetime of the process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The closed set of question widget types the core's dependency logic relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Html,
    Text,
    Date,
    Datetime,
    Time,
    Email,
    Password,
    Number,
    Double,
    Checkbox,
    CheckboxGroup,
    Radio,
    Dropdown,
    MultiSelectCombobox,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Datetime => "DATETIME",
            Self::Time => "TIME",
            Self::Email => "EMAIL",
            Self::Password => "PASSWORD",
            Self::Number => "NUMBER",
            Self::Double => "DOUBLE",
            Self::Checkbox => "CHECKBOX",
            Self::CheckboxGroup => "CHECKBOX_GROUP",
            Self::Radio => "RADIO",
            Self::Dropdown => "DROPDOWN",
            Self::MultiSelectCombobox => "MULTI_SELECT_COMBOBOX",
        }
    }

    /// Types whose mere presence (regardless of textValue) counts for dependency
    /// purposes — HTML has no user-entered value but is always "present".
    pub fn always_present(&self) -> bool {
        matches!(self, Self::Html)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "HTML" => Self::Html,
            "TEXT" => Self::Text,
            "DATE" => Self::Date,
            "DATETIME" => Self::Datetime,
            "TIME" => Self::Time,
            "EMAIL" => Self::Email,
            "PASSWORD" => Self::Password,
            "NUMBER" => Self::Number,
            "DOUBLE" => Self::Double,
            "CHECKBOX" => Self::Checkbox,
            "CHECKBOX_GROUP" => Self::CheckboxGroup,
            "RADIO" => Self::Radio,
            "DROPDOWN" => Self::Dropdown,
            "MULTI_SELECT_COMBOBOX" => Self::MultiSelectCombobox,
            other => return Err(AppError::Internal(format!("unknown question type: {other}"))),
        })
    }
}

/// Action a `Relationship` takes once its operator is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Show,
    Repeat,
    Text,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "SHOW",
            Self::Repeat => "REPEAT",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SHOW" => Self::Show,
            "REPEAT" => Self::Repeat,
            "TEXT" => Self::Text,
            other => return Err(AppError::Internal(format!("unknown action type: {other}"))),
        })
    }
}

/// Comparison operator a `Relationship` evaluates against its upstream answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorType {
    Boolean,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    Contains,
    FieldExist,
}

impl OperatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::Contains => "CONTAINS",
            Self::FieldExist => "FIELD_EXIST",
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperatorType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "BOOLEAN" => Self::Boolean,
            "EQUAL" => Self::Equal,
            "NOT_EQUAL" => Self::NotEqual,
            "LESS_THAN" => Self::LessThan,
            "GREATER_THAN" => Self::GreaterThan,
            "CONTAINS" => Self::Contains,
            "FIELD_EXIST" => Self::FieldExist,
            other => return Err(AppError::Internal(format!("unknown operator type: {other}"))),
        })
    }
}

/// A survey step: the top-level grouping of sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub survey_id: i64,
    pub display_order: i32,
    pub name: String,
    pub description: Option<String>,
}

/// A section within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub survey_id: i64,
    pub display_order: i32,
    /// May contain `{TOKEN}` / `{TOKEN|default}` / `{S#}` placeholders.
    pub name: String,
    pub description: Option<String>,
}

/// The join of a step and a section, carrying the canonical zero-instance DisplayKey
/// for that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsSections {
    pub id: i64,
    pub survey_id: i64,
    pub step_id: i64,
    pub step_display_order: i32,
    pub section_id: i64,
    pub section_display_order: i32,
    pub display_key: String,
}

/// A question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub survey_id: i64,
    pub question_type: QuestionType,
    /// May contain `{TOKEN}` / `{TOKEN|default}` / `{Q#}` placeholders.
    pub text: String,
    pub short_text: Option<String>,
    pub tool_tip: Option<String>,
    pub mask: Option<String>,
    pub placeholder: Option<String>,
    pub default_value: Option<String>,
    pub required: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub validation_text: Option<String>,
    pub select_group_id: Option<i64>,
    pub variant: Option<String>,
}

/// The placement of a question within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionsQuestion {
    pub id: i64,
    pub survey_id: i64,
    pub section_id: i64,
    pub question_id: i64,
    pub display_order: i32,
}

/// A named group of selectable items (for RADIO/DROPDOWN/CHECKBOX_GROUP/MULTI_SELECT_COMBOBOX).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectGroup {
    pub id: i64,
    pub survey_id: i64,
    pub name: String,
    pub items: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub id: i64,
    pub group_id: i64,
    pub coded_value: String,
    pub display_text: String,
    pub display_order: i32,
}

/// The polymorphic target of a relationship's downstream effect. Exactly one of
/// question/section/step applies, enforced here by the variant itself rather than by
/// three nullable foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum Target {
    Question(i64),
    Section(i64),
    Step(i64),
}

/// A dependency rule: when `operator_type` evaluates true against the answer at
/// `upstream_question`, `action_type` is applied to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub survey_id: i64,
    pub action_type: ActionType,
    pub operator_type: OperatorType,
    pub upstream_step_id: Option<i64>,
    pub upstream_question_id: i64,
    pub target: Target,
    pub token: Option<String>,
    pub reference_value: Option<String>,
    pub default_upstream_value: Option<String>,
}

impl Relationship {
    pub fn downstream_question_id(&self) -> Option<i64> {
        match self.target {
            Target::Question(id) => Some(id),
            _ => None,
        }
    }

    pub fn downstream_section_id(&self) -> Option<i64> {
        match self.target {
            Target::Section(id) => Some(id),
            _ => None,
        }
    }

    pub fn downstream_step_id(&self) -> Option<i64> {
        match self.target {
            Target::Step(id) => Some(id),
            _ => None,
        }
    }
}
