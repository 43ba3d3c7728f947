use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::{BookingId, ClientId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
    Canceled,
}

/// The taxonomy of message jobs the planner knows how to emit. Stored as
/// plain text in `jobs.job_type` (not a Postgres enum) so new job types can
/// be added without a migration, matching how the planner table in the spec
/// names them as opaque strings rather than a closed set the database
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    RecordCreated,
    Reminder24h,
    Reminder2h,
    Review3d,
    Repeat10d,
    RecordUpdated,
    RecordCanceled,
    Comeback3d,
}

impl JobType {
    pub const ALL: [JobType; 8] = [
        JobType::RecordCreated,
        JobType::Reminder24h,
        JobType::Reminder2h,
        JobType::Review3d,
        JobType::Repeat10d,
        JobType::RecordUpdated,
        JobType::RecordCanceled,
        JobType::Comeback3d,
    ];

    /// Job types the planner cancels wholesale on `update`/`delete` —
    /// the reminders and follow-ups that stop making sense once a
    /// booking's schedule changes or the booking itself is removed.
    pub const REMINDER_AND_FOLLOWUP: [JobType; 4] = [
        JobType::Reminder24h,
        JobType::Reminder2h,
        JobType::Review3d,
        JobType::Repeat10d,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RecordCreated => "record_created",
            JobType::Reminder24h => "reminder_24h",
            JobType::Reminder2h => "reminder_2h",
            JobType::Review3d => "review_3d",
            JobType::Repeat10d => "repeat_10d",
            JobType::RecordUpdated => "record_updated",
            JobType::RecordCanceled => "record_canceled",
            JobType::Comeback3d => "comeback_3d",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job type: {0}")]
pub struct UnknownJobType(String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|jt| jt.as_str() == s)
            .ok_or_else(|| UnknownJobType(s.to_owned()))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub company_id: i64,
    pub booking_id: Option<BookingId>,
    pub client_id: Option<ClientId>,
    pub job_type: String,
    pub run_at: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub dedupe_key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn job_type(&self) -> Result<JobType, UnknownJobType> {
        self.job_type.parse()
    }
}

/// A job the planner wants to enqueue, before the conditional upsert that
/// decides whether it actually creates a new row.
pub struct PlannedJob {
    pub company_id: i64,
    pub booking_id: BookingId,
    pub client_id: Option<ClientId>,
    pub job_type: JobType,
    pub run_at: DateTime<Utc>,
    pub dedupe_key: String,
    pub payload: Value,
}

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;
