//! Webhook ingestion: authorization, fingerprinting, and the idempotent
//! insert into `events`. Reconciliation of those events into the canonical
//! booking model happens later, in [`crate::reconciler`].

pub mod altegio;
pub mod whatsapp;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("forbidden")]
    Forbidden,
    #[error("malformed payload: {0}")]
    BadPayload(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
