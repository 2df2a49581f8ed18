//! Propagation engine module
//!
//! Orchestrates the survey's dependency graph: initial materialization, the
//! save-delete-rebuild cycle a single `saveAnswer` call runs, and the display-text
//! rebuild every write triggers. Everything here composes the stores in
//! `answer_store`, `dependent_store`, and `definition_store` over one open
//! transaction so a caller can commit or roll back the whole call atomically.
//!
//! Recursion in the underlying algorithm (a SHOW can reveal a question whose own
//! defaults trigger further SHOWs) is implemented as an explicit worklist rather
//! than function recursion, so call depth never depends on how deep a survey's
//! dependency chain runs.

use std::collections::{HashMap, VecDeque};

use sqlx::{Postgres, Transaction};
use tracing::warn;

use crate::error::AppError;
use crate::models::{
    ActionType, Answer, AnswerPatch, DisplayKey, NavResponse, QuestionType, Relationship,
    SectionsQuestion, Target,
};
use crate::services::{answer_store, definition_store::DefinitionSnapshot, dependent_store, navigation, operator, template};
use answer_store::NewAnswer;

/// Materializes every initial (non-gated) answer for the step `initial_key` points
/// at. Idempotent: repeated calls see existing rows by display key and leave them
/// alone, so calling `init` twice for the same respondent never duplicates state.
pub async fn init(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    initial_key: &DisplayKey,
) -> Result<(), AppError> {
    let mut worklist = VecDeque::new();
    let step_instance = if initial_key.step_instance == 0 { 1 } else { initial_key.step_instance };

    build_initial_answers_for_step(tx, snapshot, respondent_id, initial_key.step, step_instance, &mut worklist)
        .await?;
    drain_worklist(tx, snapshot, respondent_id, &mut worklist).await?;

    Ok(())
}

/// Returns the current view of `section_key`, materializing its initial answers
/// first if this is the respondent's first visit to that section.
pub async fn navigate(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    section_key: &DisplayKey,
) -> Result<NavResponse, AppError> {
    let mut worklist = VecDeque::new();
    build_initial_answers_for_section(
        tx,
        snapshot,
        respondent_id,
        section_key.step,
        section_key.step_instance,
        section_key.section,
        section_key.section_instance,
        &mut worklist,
    )
    .await?;
    drain_worklist(tx, snapshot, respondent_id, &mut worklist).await?;

    let step_name = snapshot.step(section_key.step).map(|s| s.name.clone()).unwrap_or_default();
    let answers = answer_store::by_section(
        tx,
        respondent_id,
        section_key.step,
        section_key.step_instance,
        section_key.section,
        section_key.section_instance,
    )
    .await?;
    let nav_items = navigation::build(tx, respondent_id).await?;
    let current_nav_item = navigation::current_item(&nav_items, &section_key.section_key().render());

    Ok(NavResponse { step: step_name, current_nav_item, answers, nav_items })
}

/// The four-step `saveAnswer` flow: persist the new value, rebuild the answer's own
/// display text, cascade-delete anything downstream whose gate no longer holds,
/// rebuild downstream questions, then return the current section view.
pub async fn save_answer(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    patch: &AnswerPatch,
) -> Result<NavResponse, AppError> {
    let key = DisplayKey::parse(&patch.display_key)?;
    let existing = answer_store::by_display_key(tx, patch.respondent_id, &patch.display_key, false)
        .await?
        .ok_or_else(|| AppError::UnknownAnswer(patch.display_key.clone()))?;

    let updated = answer_store::update_text_value(tx, existing.id, patch.text_value.as_deref()).await?;
    let updated = rebuild_display_text(tx, snapshot, patch.respondent_id, &updated).await?;

    cascade_delete(tx, snapshot, patch.respondent_id, &updated).await?;

    let mut worklist = VecDeque::from([updated.id]);
    drain_worklist(tx, snapshot, patch.respondent_id, &mut worklist).await?;

    navigate(tx, snapshot, patch.respondent_id, &key.section_key()).await
}

/// Permanently removes every soft-deleted Answer and Dependent row for a respondent.
pub async fn remove_deleted(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
) -> Result<(), AppError> {
    dependent_store::hard_delete_where_deleted(tx, respondent_id).await?;
    answer_store::hard_delete_where_deleted(tx, respondent_id).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Initial materialization
// ---------------------------------------------------------------------------

async fn build_initial_answers_for_step(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
    worklist: &mut VecDeque<i64>,
) -> Result<Answer, AppError> {
    let step_answer = ensure_step_answer(tx, snapshot, respondent_id, step_id, step_instance).await?;

    let initial = snapshot.initial_section_questions_for_step(step_id);
    let mut seen_sections = Vec::new();
    for sq in &initial {
        if !seen_sections.contains(&sq.section_id) {
            seen_sections.push(sq.section_id);
            ensure_section_answer(tx, snapshot, respondent_id, step_id, step_instance, sq.section_id, 1).await?;
        }
    }

    for sq in initial {
        build_initial_question_answer(
            tx, snapshot, respondent_id, step_id, step_instance, sq.section_id, 1, sq, worklist,
        )
        .await?;
    }

    Ok(step_answer)
}

async fn build_initial_answers_for_section(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
    section_id: i64,
    section_instance: i64,
    worklist: &mut VecDeque<i64>,
) -> Result<Answer, AppError> {
    ensure_step_answer(tx, snapshot, respondent_id, step_id, step_instance).await?;
    let section_answer =
        ensure_section_answer(tx, snapshot, respondent_id, step_id, step_instance, section_id, section_instance)
            .await?;

    for sq in snapshot.initial_section_questions_for_section(section_id) {
        build_initial_question_answer(
            tx, snapshot, respondent_id, step_id, step_instance, section_id, section_instance, sq, worklist,
        )
        .await?;
    }

    Ok(section_answer)
}

async fn build_initial_question_answer(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
    section_id: i64,
    section_instance: i64,
    sq: &SectionsQuestion,
    worklist: &mut VecDeque<i64>,
) -> Result<(), AppError> {
    let question = snapshot
        .question(sq.question_id)
        .ok_or_else(|| AppError::Internal(format!("question {} missing from snapshot", sq.question_id)))?;

    let key = DisplayKey::for_section(snapshot.survey_id(), step_id, step_instance, section_id, section_instance)
        .with_question(sq.display_order as i64, 1);

    let answer = match find_or_revive(tx, respondent_id, &key.render()).await? {
        Some(existing) => existing,
        None => {
            answer_store::insert(
                tx,
                NewAnswer {
                    respondent_id,
                    survey_id: snapshot.survey_id(),
                    step_id,
                    step_instance,
                    section_id,
                    section_instance,
                    question_id: Some(question.id),
                    question_instance: 1,
                    section_question_id: Some(sq.id),
                    display_key: key.render(),
                    display_text: question.text.clone(),
                    text_value: question.default_value.clone(),
                },
            )
            .await?
        },
    };

    let answer = rebuild_display_text(tx, snapshot, respondent_id, &answer).await?;

    if question.question_type.always_present() || answer.text_value.is_some() {
        worklist.push_back(answer.id);
    }

    Ok(())
}

async fn ensure_step_answer(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
) -> Result<Answer, AppError> {
    let key = DisplayKey::for_step(snapshot.survey_id(), step_id, step_instance);
    if let Some(existing) = find_or_revive(tx, respondent_id, &key.render()).await? {
        return Ok(existing);
    }

    let name = snapshot.step(step_id).map(|s| s.name.clone()).unwrap_or_default();
    let answer = answer_store::insert(
        tx,
        NewAnswer {
            respondent_id,
            survey_id: snapshot.survey_id(),
            step_id,
            step_instance,
            section_id: 0,
            section_instance: 0,
            question_id: None,
            question_instance: 0,
            section_question_id: None,
            display_key: key.render(),
            display_text: name,
            text_value: None,
        },
    )
    .await?;

    rebuild_display_text(tx, snapshot, respondent_id, &answer).await
}

async fn ensure_section_answer(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    step_instance: i64,
    section_id: i64,
    section_instance: i64,
) -> Result<Answer, AppError> {
    let key = DisplayKey::for_section(snapshot.survey_id(), step_id, step_instance, section_id, section_instance);
    if let Some(existing) = find_or_revive(tx, respondent_id, &key.render()).await? {
        return Ok(existing);
    }

    let name = snapshot.section(section_id).map(|s| s.name.clone()).unwrap_or_default();
    let answer = answer_store::insert(
        tx,
        NewAnswer {
            respondent_id,
            survey_id: snapshot.survey_id(),
            step_id,
            step_instance,
            section_id,
            section_instance,
            question_id: None,
            question_instance: 0,
            section_question_id: None,
            display_key: key.render(),
            display_text: name,
            text_value: None,
        },
    )
    .await?;

    rebuild_display_text(tx, snapshot, respondent_id, &answer).await
}

/// Returns the row at `display_key`, reviving it first if it's soft-deleted.
/// `answers` has a single `UNIQUE (respondent_id, display_key)` slot with no
/// partial-index carve-out for deleted rows, so a soft-deleted row still
/// occupies that slot and must be revived rather than re-inserted.
async fn find_or_revive(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    display_key: &str,
) -> Result<Option<Answer>, AppError> {
    let Some(existing) = answer_store::by_display_key(tx, respondent_id, display_key, true).await? else {
        return Ok(None);
    };
    if existing.deleted {
        return answer_store::revive(tx, respondent_id, display_key).await;
    }
    Ok(Some(existing))
}

async fn drain_worklist(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    worklist: &mut VecDeque<i64>,
) -> Result<(), AppError> {
    while let Some(upstream_id) = worklist.pop_front() {
        build_downstream_questions(tx, snapshot, respondent_id, upstream_id, worklist).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Downstream construction
// ---------------------------------------------------------------------------

/// Applies every relationship keyed off `upstream_id`, SHOW/REPEAT first and TEXT
/// last, enqueuing any freshly-materialized answer that is itself HTML or
/// non-empty so its own downstream gets built in a later pass.
async fn build_downstream_questions(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    upstream_id: i64,
    worklist: &mut VecDeque<i64>,
) -> Result<(), AppError> {
    let Some(upstream) = answer_store::by_id(tx, upstream_id).await? else { return Ok(()) };
    let Some(sq_id) = upstream.section_question_id else { return Ok(()) };

    let relationships = snapshot.relationships_by_upstream_question(Some(upstream.step_id), sq_id);
    let (gating, text): (Vec<&Relationship>, Vec<&Relationship>) =
        relationships.into_iter().partition(|r| r.action_type != ActionType::Text);

    for rel in gating {
        match rel.action_type {
            ActionType::Show => apply_show(tx, snapshot, respondent_id, rel, &upstream, worklist).await?,
            ActionType::Repeat => apply_repeat(tx, snapshot, respondent_id, rel, &upstream, worklist).await?,
            ActionType::Text => unreachable!("partitioned out above"),
        }
    }

    for rel in text {
        apply_text(tx, snapshot, respondent_id, rel, &upstream).await?;
    }

    Ok(())
}

async fn apply_show(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    rel: &Relationship,
    upstream: &Answer,
    worklist: &mut VecDeque<i64>,
) -> Result<(), AppError> {
    if !all_relationships_satisfied(tx, snapshot, respondent_id, rel, upstream).await? {
        return Ok(());
    }

    let instance = upstream.question_instance;
    match rel.target {
        Target::Question(sq_id) => {
            let Some(downstream_sq) = snapshot.section_question(sq_id) else { return Ok(()) };
            let Some(ss) = snapshot.steps_sections_for_section(downstream_sq.section_id) else { return Ok(()) };

            ensure_section_answer(tx, snapshot, respondent_id, ss.step_id, instance, downstream_sq.section_id, instance)
                .await?;

            let answer =
                build_or_revive_question_answer(tx, snapshot, respondent_id, ss.step_id, instance, downstream_sq, instance)
                    .await?;

            if let Some(answer) = answer {
                dependent_store::upsert(tx, respondent_id, upstream.id, answer.id, rel.id).await?;
                enqueue_if_active(snapshot, &answer, worklist);
            }
        },
        Target::Section(ss_id) => {
            let Some(ss) = snapshot.steps_sections().iter().find(|s| s.id == ss_id) else { return Ok(()) };
            let section_answer = build_initial_answers_for_section(
                tx, snapshot, respondent_id, ss.step_id, instance, ss.section_id, instance, worklist,
            )
            .await?;
            dependent_store::upsert(tx, respondent_id, upstream.id, section_answer.id, rel.id).await?;
        },
        Target::Step(step_id) => {
            let step_answer =
                build_initial_answers_for_step(tx, snapshot, respondent_id, step_id, instance, worklist).await?;
            dependent_store::upsert(tx, respondent_id, upstream.id, step_answer.id, rel.id).await?;
        },
    }

    Ok(())
}

async fn apply_repeat(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    rel: &Relationship,
    upstream: &Answer,
    worklist: &mut VecDeque<i64>,
) -> Result<(), AppError> {
    if !all_relationships_satisfied(tx, snapshot, respondent_id, rel, upstream).await? {
        return Ok(());
    }

    let count = upstream
        .text_value
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);
    let instance = upstream.question_instance;

    match rel.target {
        Target::Question(sq_id) => {
            let Some(downstream_sq) = snapshot.section_question(sq_id) else { return Ok(()) };
            let Some(ss) = snapshot.steps_sections_for_section(downstream_sq.section_id) else { return Ok(()) };
            ensure_section_answer(tx, snapshot, respondent_id, ss.step_id, instance, downstream_sq.section_id, instance)
                .await?;

            let base = DisplayKey::for_section(snapshot.survey_id(), ss.step_id, instance, downstream_sq.section_id, instance)
                .with_question(downstream_sq.display_order as i64, 0);
            let existing = answer_store::by_like_pattern(tx, respondent_id, &base.answer_query()).await?;

            for repeat_instance in (existing.len() as i64 + 1)..=count {
                let answer = build_or_revive_question_answer(
                    tx, snapshot, respondent_id, ss.step_id, instance, downstream_sq, repeat_instance,
                )
                .await?;
                if let Some(answer) = answer {
                    dependent_store::upsert(tx, respondent_id, upstream.id, answer.id, rel.id).await?;
                    enqueue_if_active(snapshot, &answer, worklist);
                }
            }
        },
        Target::Section(ss_id) => {
            let Some(ss) = snapshot.steps_sections().iter().find(|s| s.id == ss_id) else { return Ok(()) };
            let base = DisplayKey::for_step(snapshot.survey_id(), ss.step_id, instance).with_section(ss.section_id, 0);
            let existing =
                answer_store::section_rows_by_pattern(tx, respondent_id, &base.section_query()).await?;

            for repeat_instance in (existing.len() as i64 + 1)..=count {
                let section_answer = build_initial_answers_for_section(
                    tx, snapshot, respondent_id, ss.step_id, instance, ss.section_id, repeat_instance, worklist,
                )
                .await?;
                dependent_store::upsert(tx, respondent_id, upstream.id, section_answer.id, rel.id).await?;
            }
        },
        Target::Step(step_id) => {
            warn!(relationship_id = rel.id, step_id, "REPEAT targeting a step is not implemented");
            return Err(AppError::UnimplementedRepeatStep(rel.id));
        },
    }

    Ok(())
}

async fn apply_text(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    rel: &Relationship,
    upstream: &Answer,
) -> Result<(), AppError> {
    let qtype = question_type_for_relationship_upstream(snapshot, rel)?;
    let satisfied = operator::evaluate(rel, upstream, qtype);

    match rel.target {
        Target::Question(sq_id) => {
            let Some(downstream) = fetch_matching_answer_for_question(tx, snapshot, respondent_id, sq_id, upstream).await? else {
                return Ok(());
            };
            link_or_unlink_dependent(tx, respondent_id, upstream.id, downstream.id, rel.id, satisfied).await?;
            rebuild_display_text(tx, snapshot, respondent_id, &downstream).await?;
        },
        Target::Section(ss_id) => {
            let Some(ss) = snapshot.steps_sections().iter().find(|s| s.id == ss_id) else { return Ok(()) };
            let rows = answer_store::by_section(
                tx,
                respondent_id,
                ss.step_id,
                upstream.step_instance,
                ss.section_id,
                upstream.section_instance,
            )
            .await?;
            for downstream in rows {
                link_or_unlink_dependent(tx, respondent_id, upstream.id, downstream.id, rel.id, satisfied).await?;
                rebuild_display_text(tx, snapshot, respondent_id, &downstream).await?;
            }
        },
        Target::Step(_) => {
            warn!(relationship_id = rel.id, "TEXT targeting a step is not a supported shape, skipping");
        },
    }

    Ok(())
}

async fn link_or_unlink_dependent(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    upstream_answer_id: i64,
    downstream_answer_id: i64,
    relationship_id: i64,
    satisfied: bool,
) -> Result<(), AppError> {
    if satisfied {
        dependent_store::upsert(tx, respondent_id, upstream_answer_id, downstream_answer_id, relationship_id).await?;
    } else if let Some(existing) =
        dependent_store::find_unique(tx, respondent_id, upstream_answer_id, downstream_answer_id, relationship_id)
            .await?
    {
        dependent_store::soft_delete(tx, existing.id).await?;
    }
    Ok(())
}

async fn fetch_matching_answer_for_question(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    sq_id: i64,
    instance_hint: &Answer,
) -> Result<Option<Answer>, AppError> {
    let Some(sq) = snapshot.section_question(sq_id) else { return Ok(None) };
    let Some(ss) = snapshot.steps_sections_for_section(sq.section_id) else { return Ok(None) };

    let key = DisplayKey::new(
        snapshot.survey_id(),
        ss.step_id,
        instance_hint.step_instance,
        sq.section_id,
        instance_hint.section_instance,
        sq.display_order as i64,
        instance_hint.question_instance,
    );
    answer_store::by_display_key(tx, respondent_id, &key.render(), false).await
}

/// `instance` is the upstream question's instance number, per the rule that a
/// SHOW/REPEAT's downstream step and section instances both come from the
/// triggering question's instance rather than its own step/section instance.
async fn build_or_revive_question_answer(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    step_id: i64,
    instance: i64,
    sq: &SectionsQuestion,
    question_instance: i64,
) -> Result<Option<Answer>, AppError> {
    let question = snapshot
        .question(sq.question_id)
        .ok_or_else(|| AppError::Internal(format!("question {} missing from snapshot", sq.question_id)))?;

    let key = DisplayKey::for_section(snapshot.survey_id(), step_id, instance, sq.section_id, instance)
        .with_question(sq.display_order as i64, question_instance);

    if let Some(existing) = find_or_revive(tx, respondent_id, &key.render()).await? {
        return Ok(Some(existing));
    }

    let answer = answer_store::insert(
        tx,
        NewAnswer {
            respondent_id,
            survey_id: snapshot.survey_id(),
            step_id,
            step_instance: instance,
            section_id: sq.section_id,
            section_instance: instance,
            question_id: Some(question.id),
            question_instance,
            section_question_id: Some(sq.id),
            display_key: key.render(),
            display_text: question.text.clone(),
            text_value: None,
        },
    )
    .await?;

    Ok(Some(rebuild_display_text(tx, snapshot, respondent_id, &answer).await?))
}

fn enqueue_if_active(snapshot: &DefinitionSnapshot, answer: &Answer, worklist: &mut VecDeque<i64>) {
    let always_present = answer
        .section_question_id
        .and_then(|sq_id| snapshot.section_question(sq_id))
        .and_then(|sq| snapshot.question(sq.question_id))
        .map(|q| q.question_type.always_present())
        .unwrap_or(false);

    if always_present || answer.text_value.is_some() {
        worklist.push_back(answer.id);
    }
}

/// A SHOW/REPEAT relationship only fires once every non-TEXT relationship sharing
/// its target also evaluates true — a target with several upstream gates requires
/// all of them satisfied, not just the one that just changed.
async fn all_relationships_satisfied(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    rel: &Relationship,
    instance_hint: &Answer,
) -> Result<bool, AppError> {
    let siblings = match rel.target {
        Target::Question(id) => snapshot.relationships_by_downstream_question(id),
        Target::Section(id) => snapshot.relationships_by_downstream_section(id),
        Target::Step(id) => snapshot.relationships_by_downstream_step(id),
    };

    for sibling in siblings.into_iter().filter(|r| r.action_type != ActionType::Text) {
        let Some(sibling_upstream) = fetch_upstream_answer_for_relationship(tx, snapshot, respondent_id, sibling, instance_hint).await? else {
            return Ok(false);
        };
        let qtype = question_type_for_relationship_upstream(snapshot, sibling)?;
        if !operator::evaluate(sibling, &sibling_upstream, qtype) {
            return Ok(false);
        }
    }

    Ok(true)
}

async fn fetch_upstream_answer_for_relationship(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    rel: &Relationship,
    instance_hint: &Answer,
) -> Result<Option<Answer>, AppError> {
    let Some(sq) = snapshot.section_question(rel.upstream_question_id) else { return Ok(None) };
    let Some(ss) = snapshot.steps_sections_for_section(sq.section_id) else { return Ok(None) };

    let key = DisplayKey::new(
        snapshot.survey_id(),
        ss.step_id,
        instance_hint.step_instance,
        sq.section_id,
        instance_hint.section_instance,
        sq.display_order as i64,
        instance_hint.question_instance,
    );
    answer_store::by_display_key(tx, respondent_id, &key.render(), false).await
}

fn question_type_for_relationship_upstream(
    snapshot: &DefinitionSnapshot,
    rel: &Relationship,
) -> Result<QuestionType, AppError> {
    let sq = snapshot
        .section_question(rel.upstream_question_id)
        .ok_or_else(|| AppError::Internal(format!("relationship {} upstream section-question missing", rel.id)))?;
    let question = snapshot
        .question(sq.question_id)
        .ok_or_else(|| AppError::Internal(format!("question {} missing from snapshot", sq.question_id)))?;
    Ok(question.question_type)
}

// ---------------------------------------------------------------------------
// Display-text rebuild
// ---------------------------------------------------------------------------

/// Rebuilds `answer.display_text` from its raw definition text and the token map
/// implied by its active (non-deleted) Dependent edges, persisting and returning
/// the refreshed row. Runs after every insert and after every `saveAnswer` write.
async fn rebuild_display_text(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    answer: &Answer,
) -> Result<Answer, AppError> {
    let base_text = base_text_for(snapshot, answer)?;
    let tokens = token_map_for(tx, snapshot, respondent_id, answer).await?;

    // {S#} reads whichever coordinate actually varies across repeat instances of
    // this answer: section_instance for anything scoped under a section (a
    // repeated section's own instances live there, not in step_instance, which
    // stays fixed for an un-repeated step), step_instance otherwise.
    let repeat_instance = if answer.section_id != 0 { answer.section_instance } else { answer.step_instance };
    let rendered = template::expand(&base_text, &tokens, answer.question_instance, repeat_instance);
    answer_store::update_display_text(tx, answer.id, &rendered).await?;

    let mut updated = answer.clone();
    updated.display_text = rendered;
    Ok(updated)
}

fn base_text_for(snapshot: &DefinitionSnapshot, answer: &Answer) -> Result<String, AppError> {
    if let Some(question_id) = answer.question_id {
        return Ok(snapshot
            .question(question_id)
            .ok_or_else(|| AppError::Internal(format!("question {question_id} missing from snapshot")))?
            .text
            .clone());
    }

    let key = answer.key()?;
    if key.is_step_level() {
        return Ok(snapshot.step(answer.step_id).map(|s| s.name.clone()).unwrap_or_default());
    }
    Ok(snapshot.section(answer.section_id).map(|s| s.name.clone()).unwrap_or_default())
}

async fn token_map_for(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    answer: &Answer,
) -> Result<HashMap<String, String>, AppError> {
    let mut tokens = HashMap::new();

    for dependent in dependent_store::by_downstream(tx, respondent_id, answer.id).await? {
        let Some(rel) = snapshot.relationship(dependent.relationship_id) else { continue };
        let Some(token) = &rel.token else { continue };
        let Some(upstream) = answer_store::by_id(tx, dependent.upstream_answer_id).await? else { continue };
        let qtype = question_type_for_relationship_upstream(snapshot, rel)?;

        let value = match qtype {
            QuestionType::Checkbox
            | QuestionType::CheckboxGroup
            | QuestionType::Dropdown
            | QuestionType::Html
            | QuestionType::Number
            | QuestionType::Radio => rel.default_upstream_value.clone().or_else(|| upstream.text_value.clone()),
            _ => upstream.text_value.clone(),
        };

        if let Some(value) = value {
            tokens.insert(token.clone(), value);
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Delete cascade
// ---------------------------------------------------------------------------

/// Deletes every downstream answer whose gate no longer holds, and everything
/// transitively downstream of those. Run with an explicit work queue instead of
/// recursive async calls, keyed by `root_id` so only the relationship that
/// actually changed gets re-evaluated against its operator; anything further
/// downstream is dropped unconditionally since its own upstream is gone.
async fn cascade_delete(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &DefinitionSnapshot,
    respondent_id: i64,
    root: &Answer,
) -> Result<(), AppError> {
    let mut queue: VecDeque<(i64, bool)> = VecDeque::new();
    queue.push_back((root.id, true));

    while let Some((answer_id, is_root)) = queue.pop_front() {
        let Some(answer) = answer_store::by_id(tx, answer_id).await? else { continue };
        if answer.deleted {
            continue;
        }

        for dependent in dependent_store::by_upstream(tx, respondent_id, answer.id).await? {
            let Some(rel) = snapshot.relationship(dependent.relationship_id) else { continue };

            match rel.action_type {
                ActionType::Show => {
                    let should_delete = if is_root {
                        let qtype = question_type_for_relationship_upstream(snapshot, rel)?;
                        !operator::evaluate(rel, &answer, qtype)
                    } else {
                        true
                    };
                    if should_delete {
                        soft_delete_subtree(tx, respondent_id, dependent.downstream_answer_id).await?;
                        queue.push_back((dependent.downstream_answer_id, false));
                    }
                },
                ActionType::Repeat => {
                    if is_root {
                        let count = answer
                            .text_value
                            .as_deref()
                            .and_then(|v| v.trim().parse::<i64>().ok())
                            .unwrap_or(0)
                            .max(0);
                        if let Some(downstream) = answer_store::by_id(tx, dependent.downstream_answer_id).await? {
                            let instance = if downstream.question_id.is_some() {
                                downstream.question_instance
                            } else {
                                downstream.section_instance
                            };
                            if instance > count {
                                soft_delete_subtree(tx, respondent_id, downstream.id).await?;
                                queue.push_back((downstream.id, false));
                            }
                        }
                    } else {
                        soft_delete_subtree(tx, respondent_id, dependent.downstream_answer_id).await?;
                        queue.push_back((dependent.downstream_answer_id, false));
                    }
                },
                ActionType::Text => {
                    dependent_store::soft_delete(tx, dependent.id).await?;
                    if let Some(downstream) = answer_store::by_id(tx, dependent.downstream_answer_id).await? {
                        rebuild_display_text(tx, snapshot, respondent_id, &downstream).await?;
                    }
                },
            }
        }
    }

    Ok(())
}

/// Soft-deletes `answer_id` and, if it addresses a section or step level, every
/// answer nested under its display-key prefix along with their Dependent edges.
async fn soft_delete_subtree(
    tx: &mut Transaction<'_, Postgres>,
    respondent_id: i64,
    answer_id: i64,
) -> Result<(), AppError> {
    let Some(answer) = answer_store::by_id(tx, answer_id).await? else { return Ok(()) };
    let key = answer.key()?;

    if key.is_step_level() || key.is_section_level() {
        let pattern = if key.is_step_level() { key.step_query() } else { key.section_query() };
        for child in answer_store::by_like_pattern(tx, respondent_id, &pattern).await? {
            answer_store::soft_delete(tx, child.id).await?;
            dependent_store::soft_delete_by_downstream(tx, respondent_id, child.id).await?;
        }
    }

    answer_store::soft_delete(tx, answer.id).await?;
    dependent_store::soft_delete_by_downstream(tx, respondent_id, answer.id).await?;
    Ok(())
}
