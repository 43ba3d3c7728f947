//! Invariant 4 and the round-trip/idempotence properties (SPEC_FULL.md §8):
//! at most one `Job` per dedupe key, and re-planning a create transition
//! never duplicates rows; a canceled job is revived rather than duplicated.

mod common;

use altegio_bot::common::BookingId;
use altegio_bot::models::{Booking, Transition};
use altegio_bot::planner;
use chrono::{TimeZone, Utc};
use serde_json::json;

fn far_future_booking(company_id: i64) -> Booking {
    Booking {
        id: BookingId::new(),
        company_id,
        external_booking_id: 4242,
        client_id: None,
        external_client_id: None,
        staff_id: None,
        staff_name: None,
        starts_at: Some(Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap()),
        ends_at: None,
        duration_sec: None,
        comment: None,
        short_link: None,
        confirmed: None,
        attendance: None,
        is_deleted: false,
        total_cost: None,
        last_change_at: None,
        raw: json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn insert_booking(pool: &sqlx::PgPool, booking: &Booking) {
    sqlx::query(
        "INSERT INTO bookings (id, company_id, external_booking_id, starts_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(booking.id)
    .bind(booking.company_id)
    .bind(booking.external_booking_id)
    .bind(booking.starts_at)
    .execute(pool)
    .await
    .expect("insert booking fixture");
}

#[tokio::test]
async fn replanning_a_create_transition_does_not_duplicate_jobs() {
    let pool = common::test_pool().await;
    let booking = far_future_booking(9001);
    insert_booking(&pool, &booking).await;

    let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

    let mut tx = pool.begin().await.unwrap();
    planner::plan(&mut tx, now, &booking, Transition::Create)
        .await
        .unwrap();
    planner::plan(&mut tx, now, &booking, Transition::Create)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM jobs WHERE booking_id = $1")
            .bind(booking.id)
            .fetch_one(&pool)
            .await
            .unwrap();

    // record_created + reminder_24h + review_3d + repeat_10d, each exactly once.
    assert_eq!(count, 4);
}

#[tokio::test]
async fn a_canceled_job_is_revived_instead_of_duplicated() {
    let pool = common::test_pool().await;
    let booking = far_future_booking(9002);
    insert_booking(&pool, &booking).await;

    let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

    let mut tx = pool.begin().await.unwrap();
    planner::plan(&mut tx, now, &booking, Transition::Create)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let deleted_at = now + chrono::Duration::minutes(5);
    let mut tx = pool.begin().await.unwrap();
    planner::plan(&mut tx, deleted_at, &booking, Transition::Delete)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let canceled: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM jobs WHERE booking_id = $1 AND status = 'canceled'",
    )
    .bind(booking.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(canceled > 0);

    // Re-create with the same reminder run_at: the canceled reminder job
    // revives in place rather than a new row appearing.
    let before_total: i64 = sqlx::query_scalar("SELECT count(*) FROM jobs WHERE booking_id = $1")
        .bind(booking.id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    planner::plan(&mut tx, now, &booking, Transition::Create)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let after_total: i64 = sqlx::query_scalar("SELECT count(*) FROM jobs WHERE booking_id = $1")
        .bind(booking.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(before_total, after_total);

    let queued_reminder: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM jobs WHERE booking_id = $1 AND job_type = 'reminder_24h' AND status = 'queued'",
    )
    .bind(booking.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(queued_reminder, 1);
}
