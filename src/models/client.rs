use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::ClientId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub company_id: i64,
    pub external_client_id: i64,
    pub phone_e164: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub raw: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewClient {
    pub company_id: i64,
    pub external_client_id: i64,
    pub phone_e164: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub raw: Value,
}
