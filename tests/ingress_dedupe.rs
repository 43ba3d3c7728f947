//! Invariant 2 (SPEC_FULL.md §8): at most one `Event` row per fingerprint.

mod common;

use altegio_bot::ingress::altegio;
use serde_json::json;

#[tokio::test]
async fn duplicate_altegio_delivery_is_accepted_and_ignored() {
    let pool = common::test_pool().await;

    let payload = json!({
        "company_id": 1,
        "resource": "record",
        "resource_id": 555,
        "status": "create",
        "data": {"last_change_date": "2026-03-01T10:00:00Z"}
    });

    for _ in 0..2 {
        altegio::ingest(
            &pool,
            "s3cr3t",
            Some("s3cr3t"),
            json!({}),
            json!({}),
            payload.clone(),
        )
        .await
        .expect("ingest should succeed");
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM events WHERE company_id = 1 AND resource_id = 555",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn wrong_secret_is_rejected_and_nothing_is_stored() {
    let pool = common::test_pool().await;

    let payload = json!({
        "company_id": 2,
        "resource": "record",
        "resource_id": 999,
        "status": "create",
        "data": {"last_change_date": "2026-03-01T10:00:00Z"}
    });

    let result = altegio::ingest(
        &pool,
        "s3cr3t",
        Some("wrong"),
        json!({}),
        json!({}),
        payload,
    )
    .await;

    assert!(result.is_err());

    let count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM events WHERE company_id = 2")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}
