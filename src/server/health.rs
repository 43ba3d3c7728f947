//! `GET /health` — database round-trip plus connection-pool utilization.

use std::time::Duration;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::app::AppState;

const HEALTH_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    database: DatabaseHealth,
    connection_pool: ConnectionPoolHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectionPoolHealth {
    size: u32,
    idle: usize,
    max: u32,
}

pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let pool = state.store.pool();

    let database = match tokio::time::timeout(
        HEALTH_QUERY_TIMEOUT,
        sqlx::query("SELECT 1").execute(pool),
    )
    .await
    {
        Ok(Ok(_)) => DatabaseHealth {
            ok: true,
            error: None,
        },
        Ok(Err(err)) => DatabaseHealth {
            ok: false,
            error: Some(err.to_string()),
        },
        Err(_) => DatabaseHealth {
            ok: false,
            error: Some("database round-trip timed out".to_owned()),
        },
    };

    let connection_pool = ConnectionPoolHealth {
        size: pool.size(),
        idle: pool.num_idle(),
        max: pool.options().get_max_connections(),
    };

    let status = if database.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            ok: database.ok,
            database,
            connection_pool,
        }),
    )
}
