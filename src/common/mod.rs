//! Cross-cutting primitives shared by every domain module: typed ids, the
//! injectable clock, the `Record` CRUD trait, and webhook fingerprinting.

pub mod clock;
pub mod fingerprint;
pub mod id;
pub mod record;
pub mod time;

pub use clock::{Clock, SystemClock};
pub use id::{
    BookingId, ClientId, EventId, Id, JobId, OutboxId, SenderId, TemplateId,
};
pub use record::Record;
pub use time::BUSINESS_TZ;
