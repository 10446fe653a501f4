//! Integration tests for the due-candidate query.
//!
//! Verifies window boundaries, rule activity, appointment status eligibility
//! and the disconnected-channel flag against a real database.

mod common;

use agenda_core::notification::{EvaluationWindow, NotificationType};
use agenda_db::repositories::CandidateRepo;
use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;

use common::{seed_appointment, seed_rule, seed_tenant};

fn appointment_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap()
}

/// Window ending five minutes after the 24h horizon of `appointment_time`.
fn window_after_24h_horizon() -> EvaluationWindow {
    let now = appointment_time() - Duration::hours(24) + Duration::minutes(5);
    EvaluationWindow::ending_at(now, Duration::minutes(60))
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn finds_due_confirmation_with_projection(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    let appointment_id = seed_appointment(&pool, &tenant, appointment_time(), "SCHEDULED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, true).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    let c = &found[0];
    assert_eq!(c.appointment_id, appointment_id);
    assert_eq!(c.organization_name, "Studio Bela");
    assert_eq!(c.channel_instance_name, tenant.instance_name);
    assert!(c.channel_connected);
    assert_eq!(c.recipient_phone.as_deref(), Some("32998220082"));
    assert_eq!(c.recipient_name, "Ana");
    assert_eq!(c.service_name.as_deref(), Some("Corte"));
    assert_eq!(c.employee_name.as_deref(), Some("Bruno"));
    assert_eq!(c.price_cents, Some(15_000));
    assert_eq!(c.hours_before, 24);
    assert_eq!(c.kind().unwrap(), NotificationType::Confirmation);
    assert_eq!(c.scheduled_at, appointment_time());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn horizons_outside_window_are_not_due(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    seed_appointment(&pool, &tenant, appointment_time(), "SCHEDULED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 12, true).await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 48, true).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inactive_rules_are_ignored(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    seed_appointment(&pool, &tenant, appointment_time(), "SCHEDULED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, false).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn confirmation_skips_confirmed_appointments(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    seed_appointment(&pool, &tenant, appointment_time(), "CONFIRMED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, true).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn confirmation_includes_appointments_awaiting_confirmation(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    let id = seed_appointment(&pool, &tenant, appointment_time(), "AWAITING_CONFIRMATION").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, true).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].appointment_id, id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reminder_includes_confirmed_but_not_cancelled(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    let confirmed = seed_appointment(&pool, &tenant, appointment_time(), "CONFIRMED").await;
    seed_appointment(&pool, &tenant, appointment_time(), "CANCELLED").await;
    seed_rule(&pool, tenant.organization_id, "REMINDER", 2, true).await;

    let now = appointment_time() - Duration::hours(2) + Duration::minutes(1);
    let window = EvaluationWindow::ending_at(now, Duration::minutes(60));
    let found = CandidateRepo::find_due_reminders(&pool, &window).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].appointment_id, confirmed);
    assert_eq!(found[0].hours_before, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn disconnected_channel_is_flagged(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", false).await;
    seed_appointment(&pool, &tenant, appointment_time(), "SCHEDULED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, true).await;

    let found = CandidateRepo::find_due_confirmations(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert!(!found[0].channel_connected);
    assert_eq!(
        found[0].organization_contact_email.as_deref(),
        Some("owner@example.com")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn types_do_not_leak_between_queries(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Studio Bela", true).await;
    seed_appointment(&pool, &tenant, appointment_time(), "SCHEDULED").await;
    seed_rule(&pool, tenant.organization_id, "CONFIRMATION", 24, true).await;

    let reminders = CandidateRepo::find_due_reminders(&pool, &window_after_24h_horizon())
        .await
        .unwrap();

    assert!(reminders.is_empty());
}
