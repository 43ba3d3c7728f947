use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactRateLimit {
    pub phone_e164: String,
    pub next_allowed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimum gap enforced between two successful sends to the same contact.
pub const RATE_LIMIT_GAP_SECONDS: i64 = 30;
