//! Definition store module
//!
//! Read-only access to a survey's static schema. Loaded once at startup into an
//! immutable, process-wide [`DefinitionSnapshot`] rather than re-queried per call,
//! per the shared-resource policy: definition data never changes for the lifetime
//! of a running process.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    ActionType, Question, Relationship, Section, SectionsQuestion, SelectGroup, SelectItem, Step,
    StepsSections, Target,
};

/// An immutable, in-memory copy of one survey's full definition: steps, sections,
/// questions, select groups, and relationships. Built once by [`DefinitionSnapshot::load`]
/// and shared behind an `Arc` in `AppState`.
pub struct DefinitionSnapshot {
    survey_id: i64,
    steps: HashMap<i64, Step>,
    sections: HashMap<i64, Section>,
    steps_sections: Vec<StepsSections>,
    questions: HashMap<i64, Question>,
    sections_questions: HashMap<i64, SectionsQuestion>,
    select_groups: HashMap<i64, SelectGroup>,
    relationships: Vec<Relationship>,
}

impl DefinitionSnapshot {
    /// Loads every definition table for `survey_id` and indexes it in memory.
    pub async fn load(pool: &PgPool, survey_id: i64) -> Result<Self, AppError> {
        let steps = sqlx::query_as::<_, Step>(
            "SELECT id, survey_id, display_order, name, description \
             FROM steps WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

        let sections = sqlx::query_as::<_, Section>(
            "SELECT id, survey_id, display_order, name, description \
             FROM sections WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

        let mut steps_sections = sqlx::query_as::<_, StepsSections>(
            "SELECT id, survey_id, step_id, step_display_order, section_id, \
                    section_display_order, display_key \
             FROM steps_sections WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?;
        steps_sections.sort_by(|a, b| a.display_key.cmp(&b.display_key));

        let questions = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, survey_id, question_type, text, short_text, tool_tip, mask, \
                    placeholder, default_value, required, min_value, max_value, \
                    validation_text, select_group_id, variant \
             FROM questions WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.try_into_question())
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

        let sections_questions = sqlx::query_as::<_, SectionsQuestion>(
            "SELECT id, survey_id, section_id, question_id, display_order \
             FROM sections_questions WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|sq| (sq.id, sq))
        .collect();

        let select_items = sqlx::query_as::<_, SelectItem>(
            "SELECT si.id, si.group_id, si.coded_value, si.display_text, si.display_order \
             FROM select_items si \
             JOIN select_groups sg ON sg.id = si.group_id \
             WHERE sg.survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?;

        let mut select_groups: HashMap<i64, SelectGroup> = sqlx::query_as::<_, SelectGroupRow>(
            "SELECT id, survey_id, name FROM select_groups WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| {
            (
                row.id,
                SelectGroup {
                    id: row.id,
                    survey_id: row.survey_id,
                    name: row.name,
                    items: Vec::new(),
                },
            )
        })
        .collect();

        for item in select_items {
            if let Some(group) = select_groups.get_mut(&item.group_id) {
                group.items.push(item);
            }
        }
        for group in select_groups.values_mut() {
            group.items.sort_by_key(|i| i.display_order);
        }

        let mut relationships = sqlx::query_as::<_, RelationshipRow>(
            "SELECT id, survey_id, action_type, operator_type, upstream_step_id, \
                    upstream_question_id, downstream_question_id, downstream_section_id, \
                    downstream_step_id, token, reference_value, default_upstream_value \
             FROM relationships WHERE survey_id = $1",
        )
        .bind(survey_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.try_into_relationship())
        .collect::<Result<Vec<_>, _>>()?;
        relationships.sort_by_key(|r| r.id);

        Ok(Self {
            survey_id,
            steps,
            sections,
            steps_sections,
            questions,
            sections_questions,
            select_groups,
            relationships,
        })
    }

    pub fn survey_id(&self) -> i64 {
        self.survey_id
    }

    pub fn step(&self, id: i64) -> Option<&Step> {
        self.steps.get(&id)
    }

    pub fn section(&self, id: i64) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.get(&id)
    }

    pub fn section_question(&self, id: i64) -> Option<&SectionsQuestion> {
        self.sections_questions.get(&id)
    }

    pub fn select_group(&self, id: i64) -> Option<&SelectGroup> {
        self.select_groups.get(&id)
    }

    /// All `StepsSections` rows for this survey, ordered by `display_key`.
    pub fn steps_sections(&self) -> &[StepsSections] {
        &self.steps_sections
    }

    pub fn steps_sections_by_display_key_like(&self, pattern: &str) -> Vec<&StepsSections> {
        self.steps_sections
            .iter()
            .filter(|ss| like_match(&ss.display_key, pattern))
            .collect()
    }

    pub fn steps_sections_first_by_display_key_like(&self, pattern: &str) -> Option<&StepsSections> {
        self.steps_sections
            .iter()
            .find(|ss| like_match(&ss.display_key, pattern))
    }

    pub fn steps_sections_for_step(&self, step_id: i64) -> Vec<&StepsSections> {
        self.steps_sections.iter().filter(|ss| ss.step_id == step_id).collect()
    }

    pub fn steps_sections_for_section(&self, section_id: i64) -> Option<&StepsSections> {
        self.steps_sections.iter().find(|ss| ss.section_id == section_id)
    }

    pub fn relationship(&self, id: i64) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    pub fn section_questions_for_section(&self, section_id: i64) -> Vec<&SectionsQuestion> {
        let mut questions: Vec<&SectionsQuestion> = self
            .sections_questions
            .values()
            .filter(|sq| sq.section_id == section_id)
            .collect();
        questions.sort_by_key(|sq| (sq.display_order, sq.id));
        questions
    }

    /// Relationships whose `upstream_question_id` matches, with an optional
    /// upstream-step constraint (`None` matches relationships with no step gate).
    pub fn relationships_by_upstream_question(
        &self,
        upstream_step_id: Option<i64>,
        upstream_question_id: i64,
    ) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| {
                r.upstream_question_id == upstream_question_id
                    && (r.upstream_step_id.is_none() || r.upstream_step_id == upstream_step_id)
            })
            .collect()
    }

    pub fn relationships_by_downstream_question(&self, section_question_id: i64) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.downstream_question_id() == Some(section_question_id))
            .collect()
    }

    pub fn relationships_by_downstream_section(&self, steps_sections_id: i64) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.downstream_section_id() == Some(steps_sections_id))
            .collect()
    }

    pub fn relationships_by_downstream_step(&self, step_id: i64) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.downstream_step_id() == Some(step_id))
            .collect()
    }

    pub fn relationships_repeat_by_downstream_step(&self, step_id: i64) -> Vec<&Relationship> {
        self.relationships_by_downstream_step(step_id)
            .into_iter()
            .filter(|r| r.action_type == ActionType::Repeat)
            .collect()
    }

    fn is_question_targeted(&self, section_question_id: i64) -> bool {
        self.relationships.iter().any(|r| {
            r.action_type != ActionType::Text && r.target == Target::Question(section_question_id)
        })
    }

    fn is_section_targeted(&self, steps_sections_id: i64) -> bool {
        self.relationships.iter().any(|r| {
            r.action_type != ActionType::Text && r.target == Target::Section(steps_sections_id)
        })
    }

    fn is_step_targeted(&self, step_id: i64) -> bool {
        self.relationships
            .iter()
            .any(|r| r.action_type != ActionType::Text && r.target == Target::Step(step_id))
    }

    /// SectionsQuestions that are "initial" for `step_id`: not reachable through any
    /// non-TEXT relationship at the step, section, or question level. These are the
    /// questions materialized by `buildInitialAnswersForStep` without waiting on an
    /// upstream trigger.
    pub fn initial_section_questions_for_step(&self, step_id: i64) -> Vec<&SectionsQuestion> {
        if self.is_step_targeted(step_id) {
            return Vec::new();
        }

        let mut result = Vec::new();
        for ss in self.steps_sections_for_step(step_id) {
            if self.is_section_targeted(ss.id) {
                continue;
            }
            for sq in self.section_questions_for_section(ss.section_id) {
                if !self.is_question_targeted(sq.id) {
                    result.push(sq);
                }
            }
        }
        result.sort_by_key(|sq| (sq.display_order, sq.id));
        result
    }

    /// SectionsQuestions that are "initial" for a specific section: the section's
    /// visibility has already been decided by the caller (it is the target of a
    /// SHOW/REPEAT relationship, or itself step-initial); this only filters out
    /// questions that are themselves individually gated by a relationship.
    pub fn initial_section_questions_for_section(&self, section_id: i64) -> Vec<&SectionsQuestion> {
        self.section_questions_for_section(section_id)
            .into_iter()
            .filter(|sq| !self.is_question_targeted(sq.id))
            .collect()
    }
}

/// SQL `LIKE` semantics restricted to `%` (the only wildcard `DisplayKey` patterns use).
fn like_match(value: &str, pattern: &str) -> bool {
    match pattern.split_once('%') {
        None => value == pattern,
        Some((prefix, suffix)) => {
            value.len() >= prefix.len() + suffix.len()
                && value.starts_with(prefix)
                && value.ends_with(suffix)
        },
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    survey_id: i64,
    question_type: String,
    text: String,
    short_text: Option<String>,
    tool_tip: Option<String>,
    mask: Option<String>,
    placeholder: Option<String>,
    default_value: Option<String>,
    required: bool,
    min_value: Option<f64>,
    max_value: Option<f64>,
    validation_text: Option<String>,
    select_group_id: Option<i64>,
    variant: Option<String>,
}

impl QuestionRow {
    fn try_into_question(self) -> Result<Question, AppError> {
        Ok(Question {
            id: self.id,
            survey_id: self.survey_id,
            question_type: self.question_type.parse()?,
            text: self.text,
            short_text: self.short_text,
            tool_tip: self.tool_tip,
            mask: self.mask,
            placeholder: self.placeholder,
            default_value: self.default_value,
            required: self.required,
            min_value: self.min_value,
            max_value: self.max_value,
            validation_text: self.validation_text,
            select_group_id: self.select_group_id,
            variant: self.variant,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SelectGroupRow {
    id: i64,
    survey_id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct RelationshipRow {
    id: i64,
    survey_id: i64,
    action_type: String,
    operator_type: String,
    upstream_step_id: Option<i64>,
    upstream_question_id: i64,
    downstream_question_id: Option<i64>,
    downstream_section_id: Option<i64>,
    downstream_step_id: Option<i64>,
    token: Option<String>,
    reference_value: Option<String>,
    default_upstream_value: Option<String>,
}

impl RelationshipRow {
    fn try_into_relationship(self) -> Result<Relationship, AppError> {
        let target = match (
            self.downstream_question_id,
            self.downstream_section_id,
            self.downstream_step_id,
        ) {
            (Some(id), None, None) => Target::Question(id),
            (None, Some(id), None) => Target::Section(id),
            (None, None, Some(id)) => Target::Step(id),
            _ => {
                return Err(AppError::Internal(format!(
                    "relationship {} must target exactly one of question/section/step",
                    self.id
                )))
            },
        };

        Ok(Relationship {
            id: self.id,
            survey_id: self.survey_id,
            action_type: self.action_type.parse()?,
            operator_type: self.operator_type.parse()?,
            upstream_step_id: self.upstream_step_id,
            upstream_question_id: self.upstream_question_id,
            target,
            token: self.token,
            reference_value: self.reference_value,
            default_upstream_value: self.default_upstream_value,
        })
    }
}
