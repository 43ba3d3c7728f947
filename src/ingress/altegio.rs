//! Altegio webhook ingestion: secret check, fingerprinting, idempotent
//! insert into `events`.

use serde_json::Value;
use sqlx::PgPool;

use crate::common::fingerprint::{canonical_json, sha256_hex};
use crate::models::Transition;

use super::IngestError;

/// Fields an incoming Altegio webhook may carry at its top level. Anything
/// else lives under `data` and is only inspected for the `last_change_date`
/// used in fingerprinting.
struct ExtractedFields {
    company_id: Option<i64>,
    resource: Option<String>,
    resource_id: Option<i64>,
    transition: Option<Transition>,
    last_change_date: Option<String>,
}

fn extract(payload: &Value) -> ExtractedFields {
    let company_id = payload.get("company_id").and_then(Value::as_i64);
    let resource = payload
        .get("resource")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let resource_id = payload.get("resource_id").and_then(Value::as_i64);
    let transition = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());
    let last_change_date = payload
        .get("data")
        .and_then(|d| d.get("last_change_date").or_else(|| d.get("date")))
        .and_then(Value::as_str)
        .map(str::to_owned);

    ExtractedFields {
        company_id,
        resource,
        resource_id,
        transition,
        last_change_date,
    }
}

/// Computes the idempotency fingerprint per the structured-fields-first
/// scheme, falling back to hashing the whole canonical payload when any of
/// `companyId`/`resource`/`resourceId`/`transition` is missing.
fn compute_fingerprint(fields: &ExtractedFields, payload: &Value, secret: &str) -> String {
    match (
        fields.company_id,
        &fields.resource,
        fields.resource_id,
        fields.transition,
    ) {
        (Some(company_id), Some(resource), Some(resource_id), Some(transition)) => {
            let last_change = fields.last_change_date.as_deref().unwrap_or("");
            sha256_hex(&format!(
                "{company_id}:{resource}:{resource_id}:{transition}:{last_change}:{secret}"
            ))
        }
        _ => sha256_hex(&format!("fallback:{}", canonical_json(payload))),
    }
}

const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "cookie"];

fn strip_sensitive_headers(headers: Value) -> Value {
    match headers {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !SENSITIVE_HEADERS.contains(&k.to_ascii_lowercase().as_str()))
                .collect(),
        ),
        other => other,
    }
}

/// Accepts one raw Altegio webhook delivery. Returns `Ok(())` both when a
/// new event was stored and when the fingerprint collided with one already
/// on file — callers ack either way.
pub async fn ingest(
    pool: &PgPool,
    configured_secret: &str,
    provided_secret: Option<&str>,
    raw_query: Value,
    raw_headers: Value,
    payload: Value,
) -> Result<(), IngestError> {
    if provided_secret != Some(configured_secret) {
        return Err(IngestError::Forbidden);
    }

    let fields = extract(&payload);
    let fingerprint = compute_fingerprint(&fields, &payload, configured_secret);
    let raw_headers = strip_sensitive_headers(raw_headers);

    let transition_str = fields.transition.map(|t| t.as_str());

    sqlx::query(
        r#"
        INSERT INTO events (
            fingerprint, company_id, resource, resource_id, transition,
            raw_query, raw_headers, raw_payload
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (fingerprint) DO NOTHING
        "#,
    )
    .bind(&fingerprint)
    .bind(fields.company_id)
    .bind(&fields.resource)
    .bind(fields.resource_id)
    .bind(transition_str)
    .bind(&raw_query)
    .bind(&raw_headers)
    .bind(&payload)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_fields_drive_fingerprint_when_all_present() {
        let payload = json!({
            "company_id": 1,
            "resource": "record",
            "resource_id": 42,
            "status": "update",
            "data": {"last_change_date": "2026-03-01T10:00:00Z"}
        });
        let fields = extract(&payload);
        let fp_a = compute_fingerprint(&fields, &payload, "s3cr3t");
        let fp_b = compute_fingerprint(&fields, &payload, "s3cr3t");
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn missing_structured_fields_falls_back_to_whole_payload() {
        let payload = json!({"weird": "shape"});
        let fields = extract(&payload);
        assert!(fields.company_id.is_none());
        let fp = compute_fingerprint(&fields, &payload, "s3cr3t");
        assert_eq!(fp, sha256_hex(&format!("fallback:{}", canonical_json(&payload))));
    }

    #[test]
    fn different_transition_changes_fingerprint() {
        let create_payload = json!({
            "company_id": 1, "resource": "record", "resource_id": 42,
            "status": "create", "data": {"last_change_date": "t"}
        });
        let mut update_payload = create_payload.clone();
        update_payload["status"] = json!("update");

        let fp_create = compute_fingerprint(&extract(&create_payload), &create_payload, "s");
        let fp_update = compute_fingerprint(&extract(&update_payload), &update_payload, "s");
        assert_ne!(fp_create, fp_update);
    }

    #[test]
    fn sensitive_headers_are_stripped() {
        let headers = json!({"Authorization": "Bearer x", "Cookie": "y", "X-Keep": "z"});
        let stripped = strip_sensitive_headers(headers);
        let obj = stripped.as_object().unwrap();
        assert!(!obj.contains_key("Authorization"));
        assert!(!obj.contains_key("Cookie"));
        assert!(obj.contains_key("X-Keep"));
    }
}
