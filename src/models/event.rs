use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "transition_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Create,
    Update,
    Delete,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Create => "create",
            Transition::Update => "update",
            Transition::Delete => "delete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Transition::Create),
            "update" => Ok(Transition::Update),
            "delete" => Ok(Transition::Delete),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub fingerprint: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub company_id: Option<i64>,
    pub resource: Option<String>,
    pub resource_id: Option<i64>,
    pub transition: Option<Transition>,
    pub raw_query: Value,
    pub raw_headers: Value,
    pub raw_payload: Value,
    pub error: Option<String>,
}

/// Inputs extracted from a raw webhook delivery before it becomes an `Event`.
pub struct NewEvent {
    pub fingerprint: String,
    pub company_id: Option<i64>,
    pub resource: Option<String>,
    pub resource_id: Option<i64>,
    pub transition: Option<Transition>,
    pub raw_query: Value,
    pub raw_headers: Value,
    pub raw_payload: Value,
}
