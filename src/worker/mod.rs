//! The outbox worker: leases due jobs, renders and sends messages, enforces
//! per-recipient rate limiting, and handles retry/backoff with
//! at-most-once effective delivery per job.

pub mod backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::common::{Clock, JobId};
use crate::models::{Booking, Client, Job, JobStatus, DEFAULT_LANGUAGE};
use crate::provider::Provider;
use crate::renderer::{self, RenderError};
use crate::service::Service;

const STALE_LEASE_MINUTES: i64 = 10;
const PAST_BOOKING_GRACE_MINUTES: i64 = 5;
const RATE_LIMIT_GAP: i64 = crate::models::RATE_LIMIT_GAP_SECONDS;
const TOKEN_EXPIRED_REQUEUE_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessJobOutcome {
    Done,
    Failed,
    Canceled,
    Requeued,
    Skipped,
}

pub struct OutboxWorker<C: Clock> {
    pool: PgPool,
    clock: Arc<C>,
    provider: Arc<dyn Provider>,
    batch_size: i64,
    poll_interval: StdDuration,
    stop_on_token_expired: bool,
    token_expired: Arc<AtomicBool>,
}

impl<C: Clock> OutboxWorker<C> {
    pub fn new(
        pool: PgPool,
        clock: Arc<C>,
        provider: Arc<dyn Provider>,
        batch_size: i64,
        poll_interval_ms: u64,
        stop_on_token_expired: bool,
    ) -> Self {
        Self {
            pool,
            clock,
            provider,
            batch_size,
            poll_interval: StdDuration::from_millis(poll_interval_ms),
            stop_on_token_expired,
            token_expired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token_expired_flag(&self) -> Arc<AtomicBool> {
        self.token_expired.clone()
    }

    async fn recover_stale_leases(&self) -> sqlx::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'queued',
                locked_at = NULL,
                run_at = now(),
                last_error = 'Recovered: stale processing job'
            WHERE status = 'processing' AND locked_at < now() - ($1 || ' minutes')::interval
            "#,
        )
        .bind(STALE_LEASE_MINUTES.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn lease_batch(&self) -> sqlx::Result<Vec<JobId>> {
        sqlx::query_scalar(
            r#"
            WITH next_jobs AS (
                SELECT id FROM jobs
                WHERE status = 'queued' AND run_at <= now()
                ORDER BY run_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs SET status = 'processing', locked_at = now()
            FROM next_jobs
            WHERE jobs.id = next_jobs.id
            RETURNING jobs.id
            "#,
        )
        .bind(self.batch_size)
        .fetch_all(&self.pool)
        .await
    }

    async fn process_job(&self, job_id: JobId) -> anyhow::Result<ProcessJobOutcome> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let Some(mut job) = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE SKIP LOCKED")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(ProcessJobOutcome::Skipped);
        };

        let has_success: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM outbox WHERE job_id = $1 AND status IN ('sent', 'delivered', 'read'))",
        )
        .bind(job.id)
        .fetch_one(&mut *tx)
        .await?;

        if has_success {
            mark_job(&mut tx, job.id, JobStatus::Done, None, None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Done);
        }

        if job.attempts >= job.max_attempts {
            mark_job(
                &mut tx,
                job.id,
                JobStatus::Failed,
                Some("Max attempts reached"),
                None,
            )
            .await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        }

        let Some(booking_id) = job.booking_id else {
            mark_job(&mut tx, job.id, JobStatus::Failed, Some("No booking"), None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        };

        let booking: Option<Booking> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(booking) = booking else {
            mark_job(&mut tx, job.id, JobStatus::Failed, Some("Booking not found"), None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        };

        if let Some(starts_at) = booking.starts_at {
            if starts_at < now - Duration::minutes(PAST_BOOKING_GRACE_MINUTES) {
                mark_job(
                    &mut tx,
                    job.id,
                    JobStatus::Canceled,
                    Some("Skipped: record starts_at is in the past"),
                    None,
                )
                .await?;
                tx.commit().await?;
                return Ok(ProcessJobOutcome::Canceled);
            }
        }

        let client_id = job.client_id.or(booking.client_id);
        let client: Option<Client> = match client_id {
            Some(id) => sqlx::query_as("SELECT * FROM clients WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?,
            None => None,
        };

        let Some(client) = client else {
            mark_job(&mut tx, job.id, JobStatus::Failed, Some("No phone_e164"), None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        };

        let Some(phone) = client.phone_e164.clone().filter(|p| !p.is_empty()) else {
            mark_job(&mut tx, job.id, JobStatus::Failed, Some("No phone_e164"), None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        };

        let next_allowed_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT next_allowed_at FROM contact_rate_limits WHERE phone_e164 = $1 FOR UPDATE")
                .bind(&phone)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(next_allowed_at) = next_allowed_at {
            if next_allowed_at > now {
                mark_job(&mut tx, job.id, JobStatus::Queued, None, Some(next_allowed_at)).await?;
                tx.commit().await?;
                return Ok(ProcessJobOutcome::Requeued);
            }

            sqlx::query(
                "UPDATE contact_rate_limits SET next_allowed_at = $2, updated_at = now() WHERE phone_e164 = $1",
            )
            .bind(&phone)
            .bind(now + Duration::seconds(RATE_LIMIT_GAP))
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO contact_rate_limits (phone_e164, next_allowed_at) VALUES ($1, $2)",
            )
            .bind(&phone)
            .bind(now + Duration::seconds(RATE_LIMIT_GAP))
            .execute(&mut *tx)
            .await?;
        }

        let job_type_code = job.job_type.clone();
        let rendered = match renderer::render(
            &mut tx,
            job.company_id,
            &job_type_code,
            &booking,
            &client,
            DEFAULT_LANGUAGE,
        )
        .await
        {
            Ok(r) => r,
            Err(err) => {
                let message = render_error_message(&err);
                mark_job(&mut tx, job.id, JobStatus::Failed, Some(&message), None).await?;
                tx.commit().await?;
                return Ok(ProcessJobOutcome::Failed);
            }
        };

        job.attempts += 1;

        let phone_number_id: Option<String> = match rendered.sender_id {
            Some(sender_id) => {
                sqlx::query_scalar("SELECT phone_number_id FROM senders WHERE id = $1")
                    .bind(sender_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let Some(phone_number_id) = phone_number_id else {
            sqlx::query("UPDATE jobs SET attempts = $2 WHERE id = $1")
                .bind(job.id)
                .bind(job.attempts)
                .execute(&mut *tx)
                .await?;
            mark_job(&mut tx, job.id, JobStatus::Failed, Some("No active sender"), None).await?;
            tx.commit().await?;
            return Ok(ProcessJobOutcome::Failed);
        };

        match self.provider.send(&phone_number_id, &phone, &rendered.body).await {
            Ok(provider_message_id) => {
                insert_outbox(
                    &mut tx,
                    &job,
                    &booking,
                    &client,
                    rendered.sender_id,
                    &phone,
                    &job_type_code,
                    &rendered.language,
                    &rendered.body,
                    crate::models::OutboxStatus::Sent,
                    Some(&provider_message_id),
                    None,
                    Some(now),
                )
                .await?;

                sqlx::query(
                    "UPDATE jobs SET attempts = $2 WHERE id = $1",
                )
                .bind(job.id)
                .bind(job.attempts)
                .execute(&mut *tx)
                .await?;

                mark_job(&mut tx, job.id, JobStatus::Done, None, None).await?;
                tx.commit().await?;
                Ok(ProcessJobOutcome::Done)
            }
            Err(err) => {
                insert_outbox(
                    &mut tx,
                    &job,
                    &booking,
                    &client,
                    rendered.sender_id,
                    &phone,
                    &job_type_code,
                    &rendered.language,
                    &rendered.body,
                    crate::models::OutboxStatus::Failed,
                    None,
                    Some(&err.to_string()),
                    None,
                )
                .await?;

                sqlx::query("UPDATE jobs SET attempts = $2 WHERE id = $1")
                    .bind(job.id)
                    .bind(job.attempts)
                    .execute(&mut *tx)
                    .await?;

                let outcome = if err.is_token_expired() {
                    self.token_expired.store(true, Ordering::Relaxed);
                    mark_job(
                        &mut tx,
                        job.id,
                        JobStatus::Queued,
                        Some(&format!("Send blocked: {err}")),
                        Some(now + Duration::seconds(TOKEN_EXPIRED_REQUEUE_SECONDS)),
                    )
                    .await?;
                    ProcessJobOutcome::Requeued
                } else if job.attempts >= job.max_attempts {
                    mark_job(&mut tx, job.id, JobStatus::Failed, Some(&err.to_string()), None).await?;
                    ProcessJobOutcome::Failed
                } else {
                    let delay = backoff::backoff(job.attempts);
                    mark_job(
                        &mut tx,
                        job.id,
                        JobStatus::Queued,
                        Some(&err.to_string()),
                        Some(now + delay),
                    )
                    .await?;
                    ProcessJobOutcome::Requeued
                };

                tx.commit().await?;
                Ok(outcome)
            }
        }
    }

    async fn requeue_remaining(&self, job_ids: &[JobId]) -> sqlx::Result<()> {
        if job_ids.is_empty() {
            return Ok(());
        }

        sqlx::query("UPDATE jobs SET status = 'queued', locked_at = NULL WHERE id = ANY($1)")
            .bind(job_ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn render_error_message(err: &RenderError) -> String {
    format!("Template render error: {err}")
}

/// Updates a job's terminal or requeued state. Every call site clears the
/// lease — either the job is done/failed/canceled, or it's being
/// requeued for a worker (any worker) to pick up later.
async fn mark_job(
    tx: &mut Transaction<'_, Postgres>,
    job_id: JobId,
    status: JobStatus,
    last_error: Option<&str>,
    run_at: Option<DateTime<Utc>>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET
            status = $2,
            last_error = $3,
            run_at = COALESCE($4, run_at),
            locked_at = NULL,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(status)
    .bind(last_error)
    .bind(run_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_outbox(
    tx: &mut Transaction<'_, Postgres>,
    job: &Job,
    booking: &Booking,
    client: &Client,
    sender_id: Option<crate::common::SenderId>,
    phone_e164: &str,
    template_code: &str,
    language: &str,
    body: &str,
    status: crate::models::OutboxStatus,
    provider_message_id: Option<&str>,
    error: Option<&str>,
    sent_at: Option<DateTime<Utc>>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox (
            company_id, client_id, booking_id, job_id, sender_id, phone_e164,
            template_code, language, body, status, provider_message_id, error,
            scheduled_at, sent_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(job.company_id)
    .bind(client.id)
    .bind(booking.id)
    .bind(job.id)
    .bind(sender_id)
    .bind(phone_e164)
    .bind(template_code)
    .bind(language)
    .bind(body)
    .bind(status)
    .bind(provider_message_id)
    .bind(error)
    .bind(job.run_at)
    .bind(sent_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl<C: Clock> Service for OutboxWorker<C> {
    fn name(&self) -> &'static str {
        "outbox-worker"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("outbox worker starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(err) = self.recover_stale_leases().await {
                error!(error = %err, "stale lease recovery failed");
            }

            let batch = self.lease_batch().await?;

            if batch.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
                continue;
            }

            for (i, job_id) in batch.iter().enumerate() {
                match self.process_job(*job_id).await {
                    Ok(outcome) => {
                        info!(job_id = %job_id, outcome = ?outcome, "processed job");
                    }
                    Err(err) => {
                        error!(job_id = %job_id, error = %err, "job processing errored");
                    }
                }

                if self.stop_on_token_expired && self.token_expired.load(Ordering::Relaxed) {
                    warn!("token expired signal observed, halting worker and requeuing remaining batch");
                    self.requeue_remaining(&batch[i + 1..]).await?;
                    return Ok(());
                }
            }
        }

        info!("outbox worker stopped");
        Ok(())
    }
}
