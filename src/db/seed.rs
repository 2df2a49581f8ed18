//! Database seeding module
//!
//! Seeds the sample survey used by development and the integration test suite.
//! Every INSERT here is idempotent: a rerun against an already-seeded database
//! is a no-op, checked via existence of the survey row rather than `ON CONFLICT`,
//! since most of these tables have no natural unique key to conflict on.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Seed the sample survey used by the default deployment and the test suite.
///
/// The survey walks a respondent through a consent gate, an optional
/// "filling this out for someone else" branch that renames the birthday
/// question, a repeating family-member section, and a repeating per-pet
/// section whose name is templated from that instance's own pet-name answer.
pub async fn seed_sample_survey(db: &PgPool) -> Result<()> {
    info!("Checking sample survey...");

    let existing: Option<i64> = sqlx::query_scalar!("SELECT id FROM surveys WHERE id = 1")
        .fetch_optional(db)
        .await
        .context("failed to check for existing sample survey")?;

    if existing.is_some() {
        info!("Sample survey already seeded, skipping");
        return Ok(());
    }

    let mut tx = db.begin().await.context("failed to start seed transaction")?;

    sqlx::query!(
        "INSERT INTO surveys (id, name, description) VALUES (1, $1, $2)",
        "Sample Survey",
        "Demonstrates consent gating, name substitution, and repeating sections"
    )
    .execute(&mut *tx)
    .await
    .context("failed to insert sample survey")?;

    sqlx::query!("SELECT setval('surveys_id_seq', 1, true)")
        .execute(&mut *tx)
        .await
        .context("failed to advance surveys_id_seq")?;

    // Steps: Getting Started (consent + respondent identity), Family, Pets.
    let step_ids = insert_steps(&mut tx).await?;
    let (step_started, step_family, step_pets) = (step_ids[0], step_ids[1], step_ids[2]);

    // Sections, inserted in the order that fixes their ids: "Family Member" must
    // land on id 4 and "Pet Details" on id 6 so their rendered DisplayKeys carry
    // the section fragments the sample data was designed around.
    let section_ids = insert_sections(&mut tx).await?;
    let (sec_consent, sec_respondent, sec_family_info, sec_family_member, sec_pets, sec_pet_details) = (
        section_ids[0],
        section_ids[1],
        section_ids[2],
        section_ids[3],
        section_ids[4],
        section_ids[5],
    );

    insert_steps_section(&mut tx, step_started, 1, sec_consent, 1).await?;
    insert_steps_section(&mut tx, step_started, 1, sec_respondent, 2).await?;
    insert_steps_section(&mut tx, step_family, 2, sec_family_info, 3).await?;
    let ss_family_member = insert_steps_section(&mut tx, step_family, 2, sec_family_member, 4).await?;
    insert_steps_section(&mut tx, step_pets, 3, sec_pets, 5).await?;
    let ss_pet_details = insert_steps_section(&mut tx, step_pets, 3, sec_pet_details, 6).await?;

    let yes_no_group = insert_yes_no_group(&mut tx).await?;

    // Questions, in display order within their section.
    let q_welcome = insert_question(
        &mut tx,
        "HTML",
        "Welcome! This short survey asks about you and your household.",
        None,
        None,
    )
    .await?;
    let q_consent = insert_question(
        &mut tx,
        "RADIO",
        "Do you consent to taking part in this survey?",
        Some(yes_no_group),
        None,
    )
    .await?;
    let q_on_behalf = insert_question(
        &mut tx,
        "RADIO",
        "Are you filling this out on behalf of someone else?",
        Some(yes_no_group),
        None,
    )
    .await?;
    let q_name = insert_question(&mut tx, "TEXT", "What is their name?", None, None).await?;
    let q_birthday = insert_question(
        &mut tx,
        "DATE",
        "What is {NAME|Your}'s Birthday?",
        None,
        None,
    )
    .await?;
    let q_family_count = insert_question(
        &mut tx,
        "NUMBER",
        "How many family members (including you) will be joining?",
        None,
        Some((0.0, 20.0)),
    )
    .await?;
    let q_family_name = insert_question(&mut tx, "TEXT", "Family member's name", None, None).await?;
    let q_pet_count = insert_question(&mut tx, "NUMBER", "How many pets do you have?", None, Some((0.0, 20.0))).await?;
    let q_pet_name = insert_question(&mut tx, "TEXT", "Pet's name", None, None).await?;

    // Section name carries the per-instance "{S#} - {PET_NAME}" template, resolved
    // from the same instance's own pet-name answer rather than the last one saved.
    sqlx::query!(
        "UPDATE sections SET name = $1 WHERE id = $2",
        "Your Pet {S#} - {PET_NAME|your pet}",
        sec_pet_details
    )
    .execute(&mut *tx)
    .await
    .context("failed to template the Pet Details section name")?;

    insert_section_question(&mut tx, sec_consent, q_welcome, 1).await?;
    let sq_consent = insert_section_question(&mut tx, sec_consent, q_consent, 2).await?;
    let sq_on_behalf = insert_section_question(&mut tx, sec_consent, q_on_behalf, 3).await?;
    let sq_name = insert_section_question(&mut tx, sec_consent, q_name, 4).await?;
    let sq_birthday = insert_section_question(&mut tx, sec_respondent, q_birthday, 1).await?;
    let sq_family_count = insert_section_question(&mut tx, sec_family_info, q_family_count, 1).await?;
    let sq_family_name = insert_section_question(&mut tx, sec_family_member, q_family_name, 1).await?;
    let sq_pet_count = insert_section_question(&mut tx, sec_pets, q_pet_count, 1).await?;
    let sq_pet_name = insert_section_question(&mut tx, sec_pet_details, q_pet_name, 1).await?;

    // Consent (if true) shows the "on behalf of someone else" question.
    insert_relationship(
        &mut tx,
        "SHOW",
        "BOOLEAN",
        None,
        sq_consent,
        RelTarget::Question(sq_on_behalf),
        None,
        None,
    )
    .await?;

    // Answering "yes" to filling out on behalf of someone else shows the name field.
    insert_relationship(
        &mut tx,
        "SHOW",
        "BOOLEAN",
        None,
        sq_on_behalf,
        RelTarget::Question(sq_name),
        None,
        None,
    )
    .await?;

    // The name, once present, re-renders the birthday question's possessive.
    insert_relationship(
        &mut tx,
        "TEXT",
        "FIELD_EXIST",
        None,
        sq_name,
        RelTarget::Question(sq_birthday),
        Some("NAME"),
        None,
    )
    .await?;

    // Family member count repeats the "Family Member" section.
    insert_relationship(
        &mut tx,
        "REPEAT",
        "FIELD_EXIST",
        None,
        sq_family_count,
        RelTarget::Section(ss_family_member),
        None,
        None,
    )
    .await?;

    // Pet count repeats the "Pet Details" section.
    insert_relationship(
        &mut tx,
        "REPEAT",
        "FIELD_EXIST",
        None,
        sq_pet_count,
        RelTarget::Section(ss_pet_details),
        None,
        None,
    )
    .await?;

    // Each pet's own name re-renders its own "Pet Details" section instance,
    // scoped to that instance by `apply_text`'s section lookup, not the last
    // pet name written across every instance.
    insert_relationship(
        &mut tx,
        "TEXT",
        "FIELD_EXIST",
        None,
        sq_pet_name,
        RelTarget::Section(ss_pet_details),
        Some("PET_NAME"),
        None,
    )
    .await?;

    tx.commit().await.context("failed to commit seed transaction")?;

    info!("Seeded: sample survey (id 1)");
    Ok(())
}

async fn insert_steps(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(3);
    for (name, order) in [
        ("Getting Started", 1),
        ("Family", 2),
        ("Pets", 3),
    ] {
        let id = sqlx::query_scalar!(
            "INSERT INTO steps (survey_id, display_order, name) VALUES (1, $1, $2) RETURNING id",
            order,
            name
        )
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert step")?;
        ids.push(id);
    }
    Ok(ids)
}

async fn insert_sections(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(6);
    for (name, order) in [
        ("Consent", 1),
        ("Respondent", 2),
        ("Family Info", 3),
        ("Family Member", 4),
        ("Pets", 5),
        ("Pet Details", 6),
    ] {
        let id = sqlx::query_scalar!(
            "INSERT INTO sections (survey_id, display_order, name) VALUES (1, $1, $2) RETURNING id",
            order,
            name
        )
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert section")?;
        ids.push(id);
    }
    Ok(ids)
}

async fn insert_steps_section(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    step_id: i64,
    step_display_order: i32,
    section_id: i64,
    section_display_order: i32,
) -> Result<i64> {
    let display_key = format!(
        "0001-{:04}-0000-{:04}-0000-0000-0000",
        step_display_order, section_id
    );
    sqlx::query_scalar!(
        "INSERT INTO steps_sections \
            (survey_id, step_id, step_display_order, section_id, section_display_order, display_key) \
         VALUES (1, $1, $2, $3, $4, $5) RETURNING id",
        step_id,
        step_display_order,
        section_id,
        section_display_order,
        display_key
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert steps_sections row")
}

async fn insert_yes_no_group(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<i64> {
    let group_id = sqlx::query_scalar!(
        "INSERT INTO select_groups (survey_id, name) VALUES (1, 'Yes/No') RETURNING id"
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert select group")?;

    for (coded_value, display_text, order) in [("TRUE", "Yes", 1), ("FALSE", "No", 2)] {
        sqlx::query!(
            "INSERT INTO select_items (group_id, coded_value, display_text, display_order) \
             VALUES ($1, $2, $3, $4)",
            group_id,
            coded_value,
            display_text,
            order
        )
        .execute(&mut **tx)
        .await
        .context("failed to insert select item")?;
    }

    Ok(group_id)
}

async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_type: &str,
    text: &str,
    select_group_id: Option<i64>,
    min_max: Option<(f64, f64)>,
) -> Result<i64> {
    let (min_value, max_value) = min_max.unzip();
    sqlx::query_scalar!(
        "INSERT INTO questions (survey_id, question_type, text, required, select_group_id, min_value, max_value) \
         VALUES (1, $1, $2, true, $3, $4, $5) RETURNING id",
        question_type,
        text,
        select_group_id,
        min_value,
        max_value
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert question")
}

async fn insert_section_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    section_id: i64,
    question_id: i64,
    display_order: i32,
) -> Result<i64> {
    sqlx::query_scalar!(
        "INSERT INTO sections_questions (survey_id, section_id, question_id, display_order) \
         VALUES (1, $1, $2, $3) RETURNING id",
        section_id,
        question_id,
        display_order
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert sections_questions row")
}

enum RelTarget {
    Question(i64),
    Section(i64),
}

#[allow(clippy::too_many_arguments)]
async fn insert_relationship(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    action_type: &str,
    operator_type: &str,
    upstream_step_id: Option<i64>,
    upstream_question_id: i64,
    target: RelTarget,
    token: Option<&str>,
    reference_value: Option<&str>,
) -> Result<i64> {
    let (downstream_question_id, downstream_section_id) = match target {
        RelTarget::Question(id) => (Some(id), None),
        RelTarget::Section(id) => (None, Some(id)),
    };

    sqlx::query_scalar!(
        "INSERT INTO relationships \
            (survey_id, action_type, operator_type, upstream_step_id, upstream_question_id, \
             downstream_question_id, downstream_section_id, token, reference_value) \
         VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        action_type,
        operator_type,
        upstream_step_id,
        upstream_question_id,
        downstream_question_id,
        downstream_section_id,
        token,
        reference_value
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert relationship")
}
