//! Invariant 1 (SPEC_FULL.md §8): at most one `Outbox` row with a successful
//! status per job. Enforced at the database level by
//! `uq_outbox_job_id_success`; this test checks the constraint actually
//! rejects a second successful row rather than trusting the migration file.

mod common;

use sqlx::Row;
use uuid::Uuid;

async fn insert_job(pool: &sqlx::PgPool, company_id: i64) -> Uuid {
    let row = sqlx::query(
        "INSERT INTO jobs (company_id, job_type, run_at, dedupe_key) \
         VALUES ($1, 'record_created', now(), $2) RETURNING id",
    )
    .bind(company_id)
    .bind(format!("dedupe-{company_id}"))
    .fetch_one(pool)
    .await
    .expect("insert job fixture");
    row.get("id")
}

async fn insert_outbox(pool: &sqlx::PgPool, job_id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO outbox (company_id, job_id, phone_e164, template_code, language, body, status, scheduled_at) \
         VALUES (1, $1, '+491701234567', 'record_created', 'de', 'hi', $2::outbox_status, now())",
    )
    .bind(job_id)
    .bind(status)
    .execute(pool)
    .await
    .map(|_| ())
}

#[tokio::test]
async fn a_second_successful_send_for_the_same_job_is_rejected() {
    let pool = common::test_pool().await;
    let job_id = insert_job(&pool, 7001).await;

    insert_outbox(&pool, job_id, "sent").await.unwrap();
    let second = insert_outbox(&pool, job_id, "sent").await;

    assert!(second.is_err(), "a second successful outbox row must violate the unique index");
}

#[tokio::test]
async fn multiple_failed_attempts_for_the_same_job_are_allowed() {
    let pool = common::test_pool().await;
    let job_id = insert_job(&pool, 7002).await;

    insert_outbox(&pool, job_id, "failed").await.unwrap();
    insert_outbox(&pool, job_id, "failed").await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox WHERE job_id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}
