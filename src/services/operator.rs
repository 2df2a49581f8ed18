//! Operator evaluator module
//!
//! Pure evaluation of a relationship's operator against an upstream answer's
//! text value. No I/O; parsing failures resolve to `false` rather than an error.

use chrono::{Datelike, NaiveDate};

use crate::models::{Answer, OperatorType, QuestionType, Relationship};

/// Evaluate `rel.operator_type` against `upstream`'s current text value.
///
/// `upstream_question_type` distinguishes the DATE branch of LESS_THAN/GREATER_THAN
/// from the numeric branch; callers fetch it from the definition store for the
/// relationship's upstream question.
pub fn evaluate(rel: &Relationship, upstream: &Answer, upstream_question_type: QuestionType) -> bool {
    match rel.operator_type {
        OperatorType::Boolean => parse_bool(upstream.text_value.as_deref()),
        OperatorType::Equal => match (&upstream.text_value, &rel.reference_value) {
            (Some(a), Some(r)) => a.eq_ignore_ascii_case(r),
            _ => false,
        },
        OperatorType::NotEqual => match (&upstream.text_value, &rel.reference_value) {
            (Some(a), Some(r)) => !a.eq_ignore_ascii_case(r),
            (Some(_), None) => true,
            _ => false,
        },
        OperatorType::FieldExist => upstream.text_value.is_some(),
        OperatorType::Contains => match (&upstream.text_value, &rel.reference_value) {
            (Some(a), Some(r)) => a.split(',').map(str::trim).any(|part| part == r),
            _ => false,
        },
        // Preserved verbatim: the source's LESS_THAN/GREATER_THAN numeric and DATE
        // branches both compare with `>=`, not the operator's apparent direction.
        OperatorType::LessThan => compare(upstream, rel, upstream_question_type, |a, r| a >= r),
        OperatorType::GreaterThan => compare(upstream, rel, upstream_question_type, |a, r| a >= r),
    }
}

fn compare(
    upstream: &Answer,
    rel: &Relationship,
    upstream_question_type: QuestionType,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let (Some(a), Some(r)) = (&upstream.text_value, &rel.reference_value) else {
        return false;
    };

    if upstream_question_type == QuestionType::Date {
        let (Ok(a_date), Ok(r_date)) = (
            NaiveDate::parse_from_str(a, "%Y-%m-%d"),
            NaiveDate::parse_from_str(r, "%Y-%m-%d"),
        ) else {
            return false;
        };
        return cmp(
            a_date.num_days_from_ce() as f64,
            r_date.num_days_from_ce() as f64,
        );
    }

    match (a.parse::<f64>(), r.parse::<f64>()) {
        (Ok(a_val), Ok(r_val)) => cmp(a_val, r_val),
        _ => false,
    }
}

fn parse_bool(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn answer_with_value(value: Option<&str>) -> Answer {
        Answer {
            id: 1,
            respondent_id: 1,
            survey_id: 1,
            step_id: 1,
            step_instance: 0,
            section_id: 1,
            section_instance: 0,
            question_id: Some(1),
            question_instance: 0,
            section_question_id: Some(1),
            display_key: "0001-0001-0000-0001-0000-0001-0000".to_string(),
            display_text: "x".to_string(),
            text_value: value.map(str::to_string),
            deleted: false,
            created_at: Utc::now(),
            saved_at: Utc::now(),
        }
    }

    fn relationship_with_reference(
        operator_type: OperatorType,
        reference_value: Option<&str>,
    ) -> Relationship {
        Relationship {
            id: 1,
            survey_id: 1,
            action_type: crate::models::ActionType::Show,
            operator_type,
            upstream_step_id: None,
            upstream_question_id: 1,
            target: crate::models::Target::Question(1),
            token: None,
            reference_value: reference_value.map(str::to_string),
            default_upstream_value: None,
        }
    }

    #[test]
    fn boolean_is_case_insensitive() {
        let rel = relationship_with_reference(OperatorType::Boolean, None);
        assert!(evaluate(&rel, &answer_with_value(Some("TRUE")), QuestionType::Radio));
        assert!(!evaluate(&rel, &answer_with_value(Some("false")), QuestionType::Radio));
        assert!(!evaluate(&rel, &answer_with_value(None), QuestionType::Radio));
    }

    #[test]
    fn equal_is_case_insensitive() {
        let rel = relationship_with_reference(OperatorType::Equal, Some("Yes"));
        assert!(evaluate(&rel, &answer_with_value(Some("yes")), QuestionType::Radio));
        assert!(!evaluate(&rel, &answer_with_value(Some("no")), QuestionType::Radio));
    }

    #[test]
    fn not_equal_requires_presence() {
        let rel = relationship_with_reference(OperatorType::NotEqual, Some("Yes"));
        assert!(evaluate(&rel, &answer_with_value(Some("no")), QuestionType::Radio));
        assert!(!evaluate(&rel, &answer_with_value(None), QuestionType::Radio));
    }

    #[test]
    fn field_exist_ignores_reference_value() {
        let rel = relationship_with_reference(OperatorType::FieldExist, None);
        assert!(evaluate(&rel, &answer_with_value(Some("anything")), QuestionType::Text));
        assert!(!evaluate(&rel, &answer_with_value(None), QuestionType::Text));
    }

    #[test]
    fn contains_splits_on_comma() {
        let rel = relationship_with_reference(OperatorType::Contains, Some("b"));
        assert!(evaluate(&rel, &answer_with_value(Some("a,b,c")), QuestionType::CheckboxGroup));
        assert!(!evaluate(&rel, &answer_with_value(Some("a,c")), QuestionType::CheckboxGroup));
    }

    #[test]
    fn less_than_numeric_is_actually_greater_or_equal() {
        let rel = relationship_with_reference(OperatorType::LessThan, Some("10"));
        assert!(evaluate(&rel, &answer_with_value(Some("10")), QuestionType::Number));
        assert!(evaluate(&rel, &answer_with_value(Some("11")), QuestionType::Number));
        assert!(!evaluate(&rel, &answer_with_value(Some("9")), QuestionType::Number));
    }

    #[test]
    fn greater_than_date_is_inclusive() {
        let rel = relationship_with_reference(OperatorType::GreaterThan, Some("2020-01-01"));
        assert!(evaluate(&rel, &answer_with_value(Some("2020-01-01")), QuestionType::Date));
        assert!(evaluate(&rel, &answer_with_value(Some("2021-01-01")), QuestionType::Date));
        assert!(!evaluate(&rel, &answer_with_value(Some("2019-01-01")), QuestionType::Date));
    }

    #[test]
    fn malformed_values_resolve_to_false_not_a_panic() {
        let rel = relationship_with_reference(OperatorType::LessThan, Some("abc"));
        assert!(!evaluate(&rel, &answer_with_value(Some("also not a number")), QuestionType::Number));
    }
}
