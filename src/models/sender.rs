use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::SenderId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sender {
    pub id: SenderId,
    pub company_id: i64,
    pub sender_code: String,
    pub phone_number_id: String,
    pub display_phone: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceSenderRule {
    pub company_id: i64,
    pub service_id: i64,
    pub sender_code: String,
}

pub const DEFAULT_SENDER_CODE: &str = "default";
