//! Data models module
//!
//! Contains struct definitions for the survey definition schema, respondent-scoped
//! state, and the DTOs the public façade exchanges with callers.

pub mod answer;
pub mod definition;
pub mod dependent;
pub mod display_key;
pub mod navigation;
pub mod respondent;

pub use answer::{Answer, AnswerPatch};
pub use definition::{
    ActionType, OperatorType, Question, QuestionType, Relationship, Section, SectionsQuestion,
    SelectGroup, SelectItem, Step, StepsSections, Target,
};
pub use dependent::Dependent;
pub use display_key::{DisplayKey, KeyField};
pub use navigation::{NavResponse, NavigationItem};
pub use respondent::Respondent;
