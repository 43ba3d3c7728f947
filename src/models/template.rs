use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::TemplateId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub company_id: i64,
    pub code: String,
    pub language: String,
    pub body: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Language used when a caller has no preference and the preferred-language
/// lookup in the renderer's fallback chain misses.
pub const DEFAULT_LANGUAGE: &str = "de";
