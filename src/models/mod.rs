//! Persisted entities. Each module owns one table's row shape; locking,
//! leasing, and upsert queries that don't fit plain CRUD live in the
//! component that needs them (`reconciler`, `planner`, `worker`).

pub mod booking;
pub mod booking_service;
pub mod client;
pub mod event;
pub mod job;
pub mod outbox;
pub mod rate_limit;
pub mod sender;
pub mod template;

pub use booking::{Booking, NewBooking};
pub use booking_service::BookingService;
pub use client::{Client, NewClient};
pub use event::{Event, EventStatus, NewEvent, Transition};
pub use job::{Job, JobStatus, JobType, PlannedJob, DEFAULT_MAX_ATTEMPTS};
pub use outbox::{NewOutbox, Outbox, OutboxStatus};
pub use rate_limit::{ContactRateLimit, RATE_LIMIT_GAP_SECONDS};
pub use sender::{Sender, ServiceSenderRule, DEFAULT_SENDER_CODE};
pub use template::{Template, DEFAULT_LANGUAGE};
