//! Consumes received webhook events and reconciles them into the canonical
//! `Client`/`Booking`/`BookingService` model, then hands the result to the
//! planner.

mod parse;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::common::Clock;
use crate::models::{Booking, Client, Event, Transition};
use crate::planner::{self, ShouldPlan};
use crate::service::Service;

pub struct Reconciler<C: Clock> {
    pool: PgPool,
    clock: Arc<C>,
    should_plan: Arc<dyn ShouldPlan>,
    batch_size: i64,
    poll_interval: StdDuration,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(
        pool: PgPool,
        clock: Arc<C>,
        should_plan: Arc<dyn ShouldPlan>,
        batch_size: i64,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            pool,
            clock,
            should_plan,
            batch_size,
            poll_interval: StdDuration::from_millis(poll_interval_ms),
        }
    }

    async fn lease_batch(&self) -> sqlx::Result<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            r#"
            WITH batch AS (
                SELECT id FROM events
                WHERE status = 'received'
                ORDER BY received_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE events SET status = 'processing'
            FROM batch
            WHERE events.id = batch.id
            RETURNING events.*
            "#,
        )
        .bind(self.batch_size)
        .fetch_all(&self.pool)
        .await
    }

    async fn process_one(&self, event: Event) {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                error!(event_id = %event.id, error = %err, "failed to open transaction");
                return;
            }
        };

        let outcome = self.reconcile(&mut tx, &event).await;

        let update_result = match &outcome {
            Ok(()) => {
                sqlx::query(
                    "UPDATE events SET status = 'processed', processed_at = now() WHERE id = $1",
                )
                .bind(event.id)
                .execute(&mut *tx)
                .await
            }
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "reconciliation failed");
                sqlx::query(
                    "UPDATE events SET status = 'failed', processed_at = now(), error = $2 WHERE id = $1",
                )
                .bind(event.id)
                .bind(err.to_string())
                .execute(&mut *tx)
                .await
            }
        };

        if let Err(err) = update_result {
            error!(event_id = %event.id, error = %err, "failed to record event outcome");
            return;
        }

        if let Err(err) = tx.commit().await {
            error!(event_id = %event.id, error = %err, "failed to commit reconciliation");
        }
    }

    async fn reconcile(&self, tx: &mut Transaction<'_, Postgres>, event: &Event) -> anyhow::Result<()> {
        let Some(resource) = event.resource.as_deref() else {
            return Ok(());
        };
        let Some(company_id) = event.company_id else {
            return Ok(());
        };

        match resource {
            "client" => {
                if let Some(new_client) = parse::extract_client(&event.raw_payload, company_id) {
                    upsert_client(tx, &new_client).await?;
                }
            }
            "record" | "record/booking" => {
                let data = event
                    .raw_payload
                    .get("data")
                    .unwrap_or(&event.raw_payload);

                let client_id = match data.get("client") {
                    Some(client_data) => {
                        if let Some(new_client) = parse::extract_client(client_data, company_id) {
                            Some(upsert_client(tx, &new_client).await?.id)
                        } else {
                            None
                        }
                    }
                    None => None,
                };

                let is_deleted = event.transition == Some(Transition::Delete);
                let Some(new_booking) = parse::extract_booking(data, company_id, client_id, is_deleted)
                else {
                    return Ok(());
                };

                let booking = upsert_booking(tx, &new_booking).await?;

                let services = parse::extract_services(data, booking.id);
                replace_booking_services(tx, booking.id, &services).await?;

                if let Some(transition) = event.transition {
                    if self.should_plan.should_plan(&booking) {
                        planner::plan(tx, self.clock.now(), &booking, transition).await?;
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

async fn upsert_client(
    tx: &mut Transaction<'_, Postgres>,
    new_client: &crate::models::NewClient,
) -> sqlx::Result<Client> {
    sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (company_id, external_client_id, phone_e164, display_name, email, raw)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (company_id, external_client_id) DO UPDATE SET
            phone_e164 = EXCLUDED.phone_e164,
            display_name = EXCLUDED.display_name,
            email = EXCLUDED.email,
            raw = EXCLUDED.raw,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(new_client.company_id)
    .bind(new_client.external_client_id)
    .bind(&new_client.phone_e164)
    .bind(&new_client.display_name)
    .bind(&new_client.email)
    .bind(&new_client.raw)
    .fetch_one(&mut **tx)
    .await
}

async fn upsert_booking(
    tx: &mut Transaction<'_, Postgres>,
    new_booking: &crate::models::NewBooking,
) -> sqlx::Result<Booking> {
    sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            company_id, external_booking_id, client_id, external_client_id,
            staff_id, staff_name, starts_at, ends_at, duration_sec, comment,
            short_link, confirmed, attendance, is_deleted, total_cost,
            last_change_at, raw
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        ON CONFLICT (company_id, external_booking_id) DO UPDATE SET
            client_id = EXCLUDED.client_id,
            external_client_id = EXCLUDED.external_client_id,
            staff_id = EXCLUDED.staff_id,
            staff_name = EXCLUDED.staff_name,
            starts_at = EXCLUDED.starts_at,
            ends_at = EXCLUDED.ends_at,
            duration_sec = EXCLUDED.duration_sec,
            comment = EXCLUDED.comment,
            short_link = EXCLUDED.short_link,
            confirmed = EXCLUDED.confirmed,
            attendance = EXCLUDED.attendance,
            is_deleted = EXCLUDED.is_deleted,
            total_cost = EXCLUDED.total_cost,
            last_change_at = EXCLUDED.last_change_at,
            raw = EXCLUDED.raw,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(new_booking.company_id)
    .bind(new_booking.external_booking_id)
    .bind(new_booking.client_id)
    .bind(new_booking.external_client_id)
    .bind(new_booking.staff_id)
    .bind(&new_booking.staff_name)
    .bind(new_booking.starts_at)
    .bind(new_booking.ends_at)
    .bind(new_booking.duration_sec)
    .bind(&new_booking.comment)
    .bind(&new_booking.short_link)
    .bind(new_booking.confirmed)
    .bind(new_booking.attendance)
    .bind(new_booking.is_deleted)
    .bind(new_booking.total_cost)
    .bind(new_booking.last_change_at)
    .bind(&new_booking.raw)
    .fetch_one(&mut **tx)
    .await
}

async fn replace_booking_services(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: crate::common::BookingId,
    services: &[crate::models::BookingService],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM booking_services WHERE booking_id = $1")
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;

    for service in services {
        sqlx::query(
            r#"
            INSERT INTO booking_services (booking_id, service_id, title, amount, cost_to_pay, raw)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(service.booking_id)
        .bind(service.service_id)
        .bind(&service.title)
        .bind(service.amount)
        .bind(service.cost_to_pay)
        .bind(&service.raw)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl<C: Clock> Service for Reconciler<C> {
    fn name(&self) -> &'static str {
        "reconciler"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("reconciler starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let batch = self.lease_batch().await?;

            if batch.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
                continue;
            }

            for event in batch {
                self.process_one(event).await;
            }
        }

        info!("reconciler stopped");
        Ok(())
    }
}
