use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::{BookingId, ClientId, JobId, OutboxId, SenderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "outbox_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Queued,
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl OutboxStatus {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            OutboxStatus::Sent | OutboxStatus::Delivered | OutboxStatus::Read
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Outbox {
    pub id: OutboxId,
    pub company_id: i64,
    pub client_id: Option<ClientId>,
    pub booking_id: Option<BookingId>,
    pub job_id: Option<JobId>,
    pub sender_id: Option<SenderId>,
    pub phone_e164: String,
    pub template_code: String,
    pub language: String,
    pub body: String,
    pub status: OutboxStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub meta: Value,
}

pub struct NewOutbox {
    pub company_id: i64,
    pub client_id: Option<ClientId>,
    pub booking_id: Option<BookingId>,
    pub job_id: Option<JobId>,
    pub sender_id: Option<SenderId>,
    pub phone_e164: String,
    pub template_code: String,
    pub language: String,
    pub body: String,
    pub status: OutboxStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}
