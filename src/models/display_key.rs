//! Display-key addressing
//!
//! A DisplayKey is the composite address of a step, section, or question (and its
//! repetitions) within a respondent's run of a survey. Every Answer, every Dependent
//! edge, and every deletion cascade pivots on this key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Width, in decimal digits, of a single DisplayKey field.
pub const FIELD_WIDTH: usize = 4;

/// Number of fields in a DisplayKey.
pub const FIELD_COUNT: usize = 7;

/// Length of the rendered key: 7 four-digit fields joined by 6 dashes.
pub const KEY_LENGTH: usize = FIELD_COUNT * FIELD_WIDTH + (FIELD_COUNT - 1);

/// One of the seven addressable levels of a DisplayKey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Survey,
    Step,
    StepInstance,
    Section,
    SectionInstance,
    Question,
    QuestionInstance,
}

/// The 7-field composite address: survey-step-stepInstance-section-sectionInstance-question-questionInstance.
///
/// Field order matches the derived `Ord` impl, so `DisplayKey` comparison equals the
/// lexical order of the rendered string as long as every field stays within 0..=9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisplayKey {
    pub survey: i64,
    pub step: i64,
    pub step_instance: i64,
    pub section: i64,
    pub section_instance: i64,
    pub question: i64,
    pub question_instance: i64,
}

impl DisplayKey {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        survey: i64,
        step: i64,
        step_instance: i64,
        section: i64,
        section_instance: i64,
        question: i64,
        question_instance: i64,
    ) -> Self {
        Self {
            survey,
            step,
            step_instance,
            section,
            section_instance,
            question,
            question_instance,
        }
    }

    /// A step-level key: section, section-instance, question, question-instance all zero.
    pub fn for_step(survey: i64, step: i64, step_instance: i64) -> Self {
        Self::new(survey, step, step_instance, 0, 0, 0, 0)
    }

    /// A section-level key: question and question-instance zero.
    pub fn for_section(
        survey: i64,
        step: i64,
        step_instance: i64,
        section: i64,
        section_instance: i64,
    ) -> Self {
        Self::new(survey, step, step_instance, section, section_instance, 0, 0)
    }

    /// Parse a rendered 34-character key. Fails with `AppError::MalformedKey` on any
    /// deviation from the 7x4-digit-field, dash-joined shape.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        if s.len() != KEY_LENGTH {
            return Err(AppError::MalformedKey(s.to_string()));
        }

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != FIELD_COUNT {
            return Err(AppError::MalformedKey(s.to_string()));
        }

        let mut fields = [0i64; FIELD_COUNT];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != FIELD_WIDTH || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AppError::MalformedKey(s.to_string()));
            }
            fields[i] = part
                .parse::<i64>()
                .map_err(|_| AppError::MalformedKey(s.to_string()))?;
        }

        Ok(Self {
            survey: fields[0],
            step: fields[1],
            step_instance: fields[2],
            section: fields[3],
            section_instance: fields[4],
            question: fields[5],
            question_instance: fields[6],
        })
    }

    /// Render the canonical dash-separated 34-character form.
    pub fn render(&self) -> String {
        format!(
            "{:04}-{:04}-{:04}-{:04}-{:04}-{:04}-{:04}",
            self.survey,
            self.step,
            self.step_instance,
            self.section,
            self.section_instance,
            self.question,
            self.question_instance
        )
    }

    /// Return a new key with one field replaced.
    pub fn with_field(&self, field: KeyField, value: i64) -> Self {
        let mut k = *self;
        match field {
            KeyField::Survey => k.survey = value,
            KeyField::Step => k.step = value,
            KeyField::StepInstance => k.step_instance = value,
            KeyField::Section => k.section = value,
            KeyField::SectionInstance => k.section_instance = value,
            KeyField::Question => k.question = value,
            KeyField::QuestionInstance => k.question_instance = value,
        }
        k
    }

    pub fn with_step(&self, step: i64, step_instance: i64) -> Self {
        self.with_field(KeyField::Step, step)
            .with_field(KeyField::StepInstance, step_instance)
    }

    pub fn with_section(&self, section: i64, section_instance: i64) -> Self {
        self.with_field(KeyField::Section, section)
            .with_field(KeyField::SectionInstance, section_instance)
    }

    pub fn with_question(&self, question: i64, question_instance: i64) -> Self {
        self.with_field(KeyField::Question, question)
            .with_field(KeyField::QuestionInstance, question_instance)
    }

    /// Zero out the question/question-instance fields, yielding the owning section key.
    pub fn section_key(&self) -> Self {
        self.with_question(0, 0)
    }

    /// Zero out everything below the step, yielding the owning step key.
    pub fn step_key(&self) -> Self {
        self.with_section(0, 0).with_question(0, 0)
    }

    pub fn is_step_level(&self) -> bool {
        self.section == 0 && self.question == 0
    }

    pub fn is_section_level(&self) -> bool {
        self.section != 0 && self.question == 0
    }

    pub fn is_question_level(&self) -> bool {
        self.question != 0
    }

    /// LIKE pattern matching every instance of this key's step, at the step level:
    /// `survey-step-%-0000-0000-0000-0000`.
    pub fn step_query(&self) -> String {
        format!(
            "{:04}-{:04}-%-0000-0000-0000-0000",
            self.survey, self.step
        )
    }

    /// LIKE pattern matching every instance of this key's section, at the section level:
    /// `survey-step-stepInstance-section-%-0000-0000`.
    pub fn section_query(&self) -> String {
        format!(
            "{:04}-{:04}-{:04}-{:04}-%-0000-0000",
            self.survey, self.step, self.step_instance, self.section
        )
    }

    /// LIKE pattern matching every instance of this key's question:
    /// `survey-step-stepInstance-section-sectionInstance-question-%`.
    pub fn answer_query(&self) -> String {
        format!(
            "{:04}-{:04}-{:04}-{:04}-{:04}-{:04}-%",
            self.survey,
            self.step,
            self.step_instance,
            self.section,
            self.section_instance,
            self.question
        )
    }
}

impl fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl FromStr for DisplayKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_round_trip() {
        let raw = "0001-0002-0000-0003-0001-0004-0002";
        let key = DisplayKey::parse(raw).unwrap();
        assert_eq!(key.render(), raw);
        assert_eq!(key.survey, 1);
        assert_eq!(key.question_instance, 2);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            DisplayKey::parse("0001-0002-0000"),
            Err(AppError::MalformedKey(_))
        ));
    }

    #[test]
    fn rejects_non_digit_field() {
        assert!(matches!(
            DisplayKey::parse("000a-0002-0000-0003-0001-0004-0002"),
            Err(AppError::MalformedKey(_))
        ));
    }

    #[test]
    fn lexical_order_matches_field_order() {
        let a = DisplayKey::parse("0001-0001-0000-0004-0001-0000-0000").unwrap();
        let b = DisplayKey::parse("0001-0001-0000-0004-0002-0000-0000").unwrap();
        assert!(a < b);
        assert!(a.render() < b.render());
    }

    #[test]
    fn query_patterns_match_spec_shape() {
        let key = DisplayKey::parse("0001-0002-0000-0003-0001-0004-0002").unwrap();
        assert_eq!(key.step_query(), "0001-0002-%-0000-0000-0000-0000");
        assert_eq!(key.section_query(), "0001-0002-0000-0003-%-0000-0000");
        assert_eq!(key.answer_query(), "0001-0002-0000-0003-0001-0004-%");
    }

    #[test]
    fn with_field_is_non_mutating() {
        let key = DisplayKey::parse("0001-0002-0000-0003-0001-0004-0002").unwrap();
        let moved = key.with_field(KeyField::QuestionInstance, 9);
        assert_eq!(key.question_instance, 2);
        assert_eq!(moved.question_instance, 9);
    }

    #[test]
    fn section_and_step_key_truncate_correctly() {
        let key = DisplayKey::parse("0001-0002-0000-0003-0001-0004-0002").unwrap();
        assert_eq!(key.section_key().render(), "0001-0002-0000-0003-0001-0000-0000");
        assert_eq!(key.step_key().render(), "0001-0002-0000-0000-0000-0000-0000");
        assert!(key.is_question_level());
        assert!(key.section_key().is_section_level());
        assert!(key.step_key().is_step_level());
    }
}
