use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::{BookingId, ClientId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub company_id: i64,
    pub external_booking_id: i64,
    pub client_id: Option<ClientId>,
    pub external_client_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub staff_name: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub comment: Option<String>,
    pub short_link: Option<String>,
    pub confirmed: Option<bool>,
    pub attendance: Option<i32>,
    pub is_deleted: bool,
    pub total_cost: Option<Decimal>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub raw: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewBooking {
    pub company_id: i64,
    pub external_booking_id: i64,
    pub client_id: Option<ClientId>,
    pub external_client_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub staff_name: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub comment: Option<String>,
    pub short_link: Option<String>,
    pub confirmed: Option<bool>,
    pub attendance: Option<i32>,
    pub is_deleted: bool,
    pub total_cost: Option<Decimal>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub raw: Value,
}
