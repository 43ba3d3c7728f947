//! HTTP handlers for the two inbound webhooks.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Extension, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::warn;

use crate::ingress::{self, IngestError};

use super::app::AppState;

fn headers_to_value(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                Value::String(value.to_str().unwrap_or("").to_owned()),
            )
        })
        .collect();
    Value::Object(map)
}

fn query_to_value(query: &HashMap<String, String>) -> Value {
    serde_json::to_value(query).unwrap_or(Value::Null)
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            IngestError::BadPayload(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            IngestError::Database(err) => {
                warn!(error = %err, "ingress database error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

pub async fn altegio_webhook_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided_secret = query.get("secret").map(String::as_str);
    if provided_secret != Some(state.config.altegio_webhook_secret.as_str()) {
        return IngestError::Forbidden.into_response();
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => return IngestError::BadPayload(err.to_string()).into_response(),
    };

    let raw_query = query_to_value(&query);
    let raw_headers = headers_to_value(&headers);

    match ingress::altegio::ingest(
        state.store.pool(),
        &state.config.altegio_webhook_secret,
        provided_secret,
        raw_query,
        raw_headers,
        payload,
    )
    .await
    {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn whatsapp_verify_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let configured_token = match &state.config.whatsapp_webhook_verify_token {
        Some(token) => token.as_str(),
        None => return StatusCode::FORBIDDEN.into_response(),
    };

    match ingress::whatsapp::verify_subscription(
        query.get("hub.mode").map(String::as_str),
        query.get("hub.verify_token").map(String::as_str),
        query.get("hub.challenge").map(String::as_str),
        configured_token,
    ) {
        Ok(challenge) => challenge.to_owned().into_response(),
        Err(_) => StatusCode::FORBIDDEN.into_response(),
    }
}

pub async fn whatsapp_webhook_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let raw_query = query_to_value(&query);
    let raw_headers = headers_to_value(&headers);

    match ingress::whatsapp::ingest(state.store.pool(), raw_query, raw_headers, payload).await {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}
