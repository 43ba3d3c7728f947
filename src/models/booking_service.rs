use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::BookingId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingService {
    pub booking_id: BookingId,
    pub service_id: i64,
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub cost_to_pay: Option<Decimal>,
    pub raw: Value,
}
