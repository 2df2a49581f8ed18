//! Integration tests for the public façade (`/api/respondents/*`), exercised
//! against the seeded sample survey: a consent gate, a name-substitution
//! branch, a repeating family-member section, and a repeating per-pet section
//! whose name is templated from that instance's own pet-name answer.

use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::TestApp;

const STEP_STARTED: i64 = 1;
const STEP_FAMILY: i64 = 2;
const STEP_PETS: i64 = 3;

const SEC_CONSENT: i64 = 1;
const SEC_RESPONDENT: i64 = 2;
const SEC_FAMILY_INFO: i64 = 3;
const SEC_FAMILY_MEMBER: i64 = 4;
const SEC_PETS: i64 = 5;
const SEC_PET_DETAILS: i64 = 6;

fn step_key(step: i64) -> String {
    format!("0001-{:04}-0000-0000-0000-0000-0000", step)
}

fn section_key(step: i64, step_instance: i64, section: i64, section_instance: i64) -> String {
    format!(
        "0001-{:04}-{:04}-{:04}-{:04}-0000-0000",
        step, step_instance, section, section_instance
    )
}

fn question_key(
    step: i64,
    step_instance: i64,
    section: i64,
    section_instance: i64,
    question_display_order: i64,
    question_instance: i64,
) -> String {
    format!(
        "0001-{:04}-{:04}-{:04}-{:04}-{:04}-{:04}",
        step, step_instance, section, section_instance, question_display_order, question_instance
    )
}

/// Inserts a bare respondent row. Respondents are created by an external
/// identity/token collaborator; the engine only reads and finalizes them.
async fn insert_respondent(pool: &PgPool) -> i64 {
    let token = Uuid::new_v4().to_string();
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO respondents (survey_id, token) VALUES (1, $1) RETURNING id",
    )
    .bind(token)
    .fetch_one(pool)
    .await
    .expect("failed to insert test respondent")
}

fn answers_array(body: &Value) -> &Vec<Value> {
    body.get("answers")
        .and_then(|v| v.as_array())
        .expect("response should have an answers array")
}

fn find_answer<'a>(answers: &'a [Value], display_key: &str) -> Option<&'a Value> {
    answers
        .iter()
        .find(|a| a.get("display_key").and_then(|v| v.as_str()) == Some(display_key))
}

#[tokio::test]
async fn init_materializes_the_starting_step() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    let response = client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await;

    response.assert_status(200);
    let body: Value = response.json().expect("response should be valid JSON");
    assert_eq!(body.get("ok").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn init_is_idempotent() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    let key = json!({ "initial_display_key": step_key(STEP_STARTED) });
    client
        .post(&format!("/api/respondents/{}/init", respondent_id), &key)
        .await
        .assert_status(200);
    client
        .post(&format!("/api/respondents/{}/init", respondent_id), &key)
        .await
        .assert_status(200);

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM answers WHERE respondent_id = $1")
        .bind(respondent_id)
        .fetch_one(app.db())
        .await
        .unwrap();
    assert!(count > 0, "init should have materialized at least one answer");
}

#[tokio::test]
async fn navigate_rejects_malformed_display_key() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    let response = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key=not-a-key",
            respondent_id
        ))
        .await;

    response.assert_status(400);
}

#[tokio::test]
async fn navigate_returns_consent_section_with_welcome_and_consent_questions() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_section = section_key(STEP_STARTED, 1, SEC_CONSENT, 1);
    let response = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key={}",
            respondent_id, consent_section
        ))
        .await;

    response.assert_status(200);
    let body: Value = response.json().unwrap();
    let answers = answers_array(&body);

    // Welcome (HTML, display_order 1) and consent (RADIO, display_order 2) are
    // both ungated, so both materialize on first navigation.
    assert!(find_answer(answers, &question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 1, 1)).is_some());
    assert!(find_answer(answers, &question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1)).is_some());

    // "On behalf of" and "name" are SHOW-gated and must not appear yet.
    assert!(find_answer(answers, &question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 3, 1)).is_none());
    assert!(find_answer(answers, &question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 4, 1)).is_none());
}

#[tokio::test]
async fn consenting_shows_the_on_behalf_question() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1);
    let response = client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "TRUE" }),
        )
        .await;

    response.assert_status(200);
    let body: Value = response.json().unwrap();
    let answers = answers_array(&body);

    let on_behalf_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 3, 1);
    assert!(
        find_answer(answers, &on_behalf_key).is_some(),
        "answering consent=TRUE should reveal the on-behalf-of question"
    );
}

#[tokio::test]
async fn declining_consent_hides_the_on_behalf_question_again() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);

    let response = client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "FALSE" }),
        )
        .await;

    response.assert_status(200);
    let body: Value = response.json().unwrap();
    let answers = answers_array(&body);

    let on_behalf_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 3, 1);
    assert!(
        find_answer(answers, &on_behalf_key).is_none(),
        "declining consent should cascade-delete the on-behalf-of question"
    );
}

#[tokio::test]
async fn naming_someone_else_personalizes_the_birthday_question() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);

    let on_behalf_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 3, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": on_behalf_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);

    let name_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 4, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": name_key, "text_value": "Dennis" }),
        )
        .await
        .assert_status(200);

    let respondent_section = section_key(STEP_STARTED, 1, SEC_RESPONDENT, 1);
    let response = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key={}",
            respondent_id, respondent_section
        ))
        .await;

    response.assert_status(200);
    let body: Value = response.json().unwrap();
    let answers = answers_array(&body);

    let birthday_key = question_key(STEP_STARTED, 1, SEC_RESPONDENT, 1, 1, 1);
    let birthday = find_answer(answers, &birthday_key).expect("birthday question should exist");
    assert_eq!(
        birthday.get("display_text").and_then(|v| v.as_str()),
        Some("What is Dennis' Birthday?"),
        "the possessive apostrophe fixup should turn \"Dennis's\" into \"Dennis'\""
    );
}

#[tokio::test]
async fn birthday_question_reverts_to_default_text_once_name_is_removed() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);

    let on_behalf_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 3, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": on_behalf_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);

    let name_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 4, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": name_key, "text_value": "Dennis" }),
        )
        .await
        .assert_status(200);

    // Declining "on behalf of" cascade-deletes the name answer, which should
    // revert the birthday question's text to its default-upstream-value form.
    let response = client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": on_behalf_key, "text_value": "FALSE" }),
        )
        .await;

    response.assert_status(200);

    let respondent_section = section_key(STEP_STARTED, 1, SEC_RESPONDENT, 1);
    let nav = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key={}",
            respondent_id, respondent_section
        ))
        .await;
    nav.assert_status(200);
    let body: Value = nav.json().unwrap();
    let answers = answers_array(&body);

    let birthday_key = question_key(STEP_STARTED, 1, SEC_RESPONDENT, 1, 1, 1);
    let birthday = find_answer(answers, &birthday_key).expect("birthday question should exist");
    assert_eq!(
        birthday.get("display_text").and_then(|v| v.as_str()),
        Some("What is Your Birthday?"),
    );
}

#[tokio::test]
async fn family_member_count_repeats_the_family_member_section() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_FAMILY) }),
        )
        .await
        .assert_status(200);

    let family_count_key = question_key(STEP_FAMILY, 1, SEC_FAMILY_INFO, 1, 1, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": family_count_key, "text_value": "3" }),
        )
        .await
        .assert_status(200);

    let instances: i64 = sqlx::query_scalar(
        "SELECT count(DISTINCT section_instance) FROM answers \
         WHERE respondent_id = $1 AND section_id = $2 AND question_id IS NULL AND deleted = false",
    )
    .bind(respondent_id)
    .bind(SEC_FAMILY_MEMBER)
    .fetch_one(app.db())
    .await
    .unwrap();

    assert_eq!(instances, 3, "family count of 3 should create 3 Family Member instances");
}

#[tokio::test]
async fn family_member_count_revives_a_decreased_instance_with_its_answer_intact() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_FAMILY) }),
        )
        .await
        .assert_status(200);

    let family_count_key = question_key(STEP_FAMILY, 1, SEC_FAMILY_INFO, 1, 1, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": family_count_key, "text_value": "3" }),
        )
        .await
        .assert_status(200);

    let member_2_name_key = question_key(STEP_FAMILY, 1, SEC_FAMILY_MEMBER, 2, 1, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": member_2_name_key, "text_value": "Priya" }),
        )
        .await
        .assert_status(200);

    // Dropping the count to 1 cascade-soft-deletes member instances 2 and 3.
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": family_count_key, "text_value": "1" }),
        )
        .await
        .assert_status(200);

    // Raising it back to 2 must revive instance 2 in place rather than try to
    // insert a second row at the same display key, which would violate the
    // unique (respondent_id, display_key) constraint.
    let response = client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": family_count_key, "text_value": "2" }),
        )
        .await;
    response.assert_status(200);

    let revived_name: Option<String> = sqlx::query_scalar(
        "SELECT text_value FROM answers \
         WHERE respondent_id = $1 AND display_key = $2 AND deleted = false",
    )
    .bind(respondent_id)
    .bind(&member_2_name_key)
    .fetch_one(app.db())
    .await
    .expect("member 2's name answer should exist and be revived, not duplicated");

    assert_eq!(
        revived_name.as_deref(),
        Some("Priya"),
        "reviving instance 2 should keep its previously entered name"
    );
}

#[tokio::test]
async fn pet_name_templates_only_its_own_section_instance() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_PETS) }),
        )
        .await
        .assert_status(200);

    let pet_count_key = question_key(STEP_PETS, 1, SEC_PETS, 1, 1, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": pet_count_key, "text_value": "2" }),
        )
        .await
        .assert_status(200);

    let pet_name_instance_1 = question_key(STEP_PETS, 1, SEC_PET_DETAILS, 1, 1, 1);
    let pet_name_instance_2 = question_key(STEP_PETS, 1, SEC_PET_DETAILS, 2, 1, 1);

    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": pet_name_instance_1, "text_value": "Rex" }),
        )
        .await
        .assert_status(200);

    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": pet_name_instance_2, "text_value": "Milo" }),
        )
        .await
        .assert_status(200);

    let section_1 = section_key(STEP_PETS, 1, SEC_PET_DETAILS, 1);
    let section_2 = section_key(STEP_PETS, 1, SEC_PET_DETAILS, 2);

    let nav_1 = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key={}",
            respondent_id, section_1
        ))
        .await;
    let nav_2 = client
        .get(&format!(
            "/api/respondents/{}/navigate?section_display_key={}",
            respondent_id, section_2
        ))
        .await;

    let body_1: Value = nav_1.json().unwrap();
    let body_2: Value = nav_2.json().unwrap();

    assert_eq!(
        body_1.get("current_nav_item").and_then(|n| n.get("name")).and_then(|v| v.as_str()),
        Some("Your Pet 1 - Rex"),
        "instance 1's section name should be templated from its own pet name"
    );
    assert_eq!(
        body_2.get("current_nav_item").and_then(|n| n.get("name")).and_then(|v| v.as_str()),
        Some("Your Pet 2 - Milo"),
        "instance 2's section name should not leak instance 1's pet name"
    );
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    let first = client
        .post(&format!("/api/respondents/{}/finalize", respondent_id), &json!({}))
        .await;
    first.assert_status(200);
    let first_body: Value = first.json().unwrap();
    let first_finalized_at = first_body.get("finalized_at").cloned();

    let second = client
        .post(&format!("/api/respondents/{}/finalize", respondent_id), &json!({}))
        .await;
    second.assert_status(200);
    let second_body: Value = second.json().unwrap();

    assert_eq!(second_body.get("active").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(second_body.get("finalized_at").cloned(), first_finalized_at);
}

#[tokio::test]
async fn finalize_unknown_respondent_returns_404() {
    let app = TestApp::new().await.expect("failed to create test app");
    let client = app.client();

    let response = client
        .post("/api/respondents/999999999/finalize", &json!({}))
        .await;

    response.assert_status(404);
}

#[tokio::test]
async fn remove_deleted_purges_cascade_deleted_rows() {
    let app = TestApp::new().await.expect("failed to create test app");
    let respondent_id = insert_respondent(app.db()).await;
    let client = app.client();

    client
        .post(
            &format!("/api/respondents/{}/init", respondent_id),
            &json!({ "initial_display_key": step_key(STEP_STARTED) }),
        )
        .await
        .assert_status(200);

    let consent_key = question_key(STEP_STARTED, 1, SEC_CONSENT, 1, 2, 1);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "TRUE" }),
        )
        .await
        .assert_status(200);
    client
        .post(
            &format!("/api/respondents/{}/answers", respondent_id),
            &json!({ "display_key": consent_key, "text_value": "FALSE" }),
        )
        .await
        .assert_status(200);

    let deleted_before: i64 =
        sqlx::query_scalar("SELECT count(*) FROM answers WHERE respondent_id = $1 AND deleted = true")
            .bind(respondent_id)
            .fetch_one(app.db())
            .await
            .unwrap();
    assert!(deleted_before > 0, "declining consent should soft-delete the on-behalf question");

    let response = client
        .post(&format!("/api/respondents/{}/remove-deleted", respondent_id), &json!({}))
        .await;
    response.assert_status(200);

    let deleted_after: i64 =
        sqlx::query_scalar("SELECT count(*) FROM answers WHERE respondent_id = $1 AND deleted = true")
            .bind(respondent_id)
            .fetch_one(app.db())
            .await
            .unwrap();
    assert_eq!(deleted_after, 0, "remove-deleted should hard-delete every soft-deleted row");
}
