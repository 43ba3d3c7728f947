//! Derives future-dated message jobs from a booking transition, with
//! dedupe and cancellation semantics so re-processing the same or a
//! revised transition never produces duplicate sends.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{Postgres, Transaction};

use crate::models::{Booking, JobType, PlannedJob, Transition, DEFAULT_MAX_ATTEMPTS};

/// Injected predicate gating whether a booking is eligible for planning at
/// all. The default allows everything; a deployment can restrict planning
/// to specific service categories without the core knowing why.
pub trait ShouldPlan: Send + Sync {
    fn should_plan(&self, booking: &Booking) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ShouldPlan for AllowAll {
    fn should_plan(&self, _booking: &Booking) -> bool {
        true
    }
}

fn reminder_and_followup_jobs(
    booking: &Booking,
    now: DateTime<Utc>,
) -> Vec<(JobType, DateTime<Utc>)> {
    let Some(starts_at) = booking.starts_at else {
        return Vec::new();
    };

    let mut jobs = Vec::new();
    let delta = starts_at - now;

    if delta > Duration::hours(24) {
        jobs.push((JobType::Reminder24h, starts_at - Duration::hours(24)));
    } else if delta > Duration::hours(2) {
        jobs.push((JobType::Reminder2h, starts_at - Duration::hours(2)));
    }

    jobs.push((JobType::Review3d, starts_at + Duration::days(3)));
    jobs.push((JobType::Repeat10d, starts_at + Duration::days(10)));

    jobs
}

fn dedupe_key(job_type: JobType, booking_id: &str, run_at: DateTime<Utc>) -> String {
    format!("{job_type}:{booking_id}:{}", run_at.to_rfc3339())
}

fn debounced_dedupe_key(booking_id: &str, now: DateTime<Utc>) -> String {
    let bucket = now.timestamp() / 60;
    format!("record_updated:{booking_id}:{bucket}")
}

fn planned(booking: &Booking, job_type: JobType, run_at: DateTime<Utc>, dedupe_key: String) -> PlannedJob {
    PlannedJob {
        company_id: booking.company_id,
        booking_id: booking.id,
        client_id: booking.client_id,
        job_type,
        run_at,
        dedupe_key,
        payload: json!({}),
    }
}

/// Idempotently enqueues `job`: inserts a fresh row, or — if a row with the
/// same dedupe key already exists and was previously `canceled` — revives
/// it. Any other existing status is left untouched.
async fn upsert_job(tx: &mut Transaction<'_, Postgres>, job: PlannedJob) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (
            company_id, booking_id, client_id, job_type, run_at,
            dedupe_key, payload, max_attempts
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (dedupe_key) DO UPDATE SET
            company_id = EXCLUDED.company_id,
            booking_id = EXCLUDED.booking_id,
            client_id = EXCLUDED.client_id,
            run_at = EXCLUDED.run_at,
            payload = EXCLUDED.payload,
            status = 'queued',
            attempts = 0,
            locked_at = NULL,
            last_error = NULL,
            updated_at = now()
        WHERE jobs.status = 'canceled'
        "#,
    )
    .bind(job.company_id)
    .bind(job.booking_id)
    .bind(job.client_id)
    .bind(job.job_type.as_str())
    .bind(job.run_at)
    .bind(&job.dedupe_key)
    .bind(&job.payload)
    .bind(DEFAULT_MAX_ATTEMPTS)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn cancel_queued(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: crate::common::BookingId,
    job_types: &[JobType],
) -> sqlx::Result<()> {
    let type_strs: Vec<&str> = job_types.iter().map(|jt| jt.as_str()).collect();
    sqlx::query(
        r#"
        UPDATE jobs SET status = 'canceled', updated_at = now()
        WHERE booking_id = $1 AND job_type = ANY($2) AND status = 'queued'
        "#,
    )
    .bind(booking_id)
    .bind(&type_strs)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Plans the jobs implied by `transition` for `booking`. Safe to call more
/// than once for logically equivalent transitions — dedupe keys and the
/// conditional upsert absorb the duplication. Runs inside the caller's
/// transaction so the job upserts commit atomically with the booking
/// upsert that produced `booking`.
pub async fn plan(
    tx: &mut Transaction<'_, Postgres>,
    now: DateTime<Utc>,
    booking: &Booking,
    transition: Transition,
) -> sqlx::Result<()> {
    let booking_id_str = booking.id.to_string();

    match transition {
        Transition::Create => {
            upsert_job(
                tx,
                planned(
                    booking,
                    JobType::RecordCreated,
                    now,
                    dedupe_key(JobType::RecordCreated, &booking_id_str, now),
                ),
            )
            .await?;

            for (job_type, run_at) in reminder_and_followup_jobs(booking, now) {
                upsert_job(
                    tx,
                    planned(booking, job_type, run_at, dedupe_key(job_type, &booking_id_str, run_at)),
                )
                .await?;
            }
        }
        Transition::Update => {
            cancel_queued(tx, booking.id, &JobType::REMINDER_AND_FOLLOWUP).await?;

            let run_at = now + Duration::seconds(60);
            upsert_job(
                tx,
                planned(
                    booking,
                    JobType::RecordUpdated,
                    run_at,
                    debounced_dedupe_key(&booking_id_str, now),
                ),
            )
            .await?;

            for (job_type, run_at) in reminder_and_followup_jobs(booking, now) {
                upsert_job(
                    tx,
                    planned(booking, job_type, run_at, dedupe_key(job_type, &booking_id_str, run_at)),
                )
                .await?;
            }
        }
        Transition::Delete => {
            cancel_queued(tx, booking.id, &JobType::REMINDER_AND_FOLLOWUP).await?;

            upsert_job(
                tx,
                planned(
                    booking,
                    JobType::RecordCanceled,
                    now,
                    dedupe_key(JobType::RecordCanceled, &booking_id_str, now),
                ),
            )
            .await?;

            let comeback_at = now + Duration::days(3);
            upsert_job(
                tx,
                planned(
                    booking,
                    JobType::Comeback3d,
                    comeback_at,
                    dedupe_key(JobType::Comeback3d, &booking_id_str, comeback_at),
                ),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking_at(starts_at: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: crate::common::BookingId::new(),
            company_id: 1,
            external_booking_id: 100,
            client_id: None,
            external_client_id: None,
            staff_id: None,
            staff_name: None,
            starts_at,
            ends_at: None,
            duration_sec: None,
            comment: None,
            short_link: None,
            confirmed: None,
            attendance: None,
            is_deleted: false,
            total_cost: None,
            last_change_at: None,
            raw: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn far_future_booking_emits_24h_reminder_not_2h() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap();
        let booking = booking_at(Some(starts_at));

        let jobs = reminder_and_followup_jobs(&booking, now);
        let types: Vec<JobType> = jobs.iter().map(|(t, _)| *t).collect();
        assert!(types.contains(&JobType::Reminder24h));
        assert!(!types.contains(&JobType::Reminder2h));
        assert!(types.contains(&JobType::Review3d));
        assert!(types.contains(&JobType::Repeat10d));
    }

    #[test]
    fn exactly_24h_out_emits_2h_reminder_not_24h() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let starts_at = now + Duration::hours(24);
        let booking = booking_at(Some(starts_at));

        let jobs = reminder_and_followup_jobs(&booking, now);
        let types: Vec<JobType> = jobs.iter().map(|(t, _)| *t).collect();
        assert!(types.contains(&JobType::Reminder2h));
        assert!(!types.contains(&JobType::Reminder24h));
    }

    #[test]
    fn within_2h_emits_no_reminder() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let starts_at = now + Duration::hours(1);
        let booking = booking_at(Some(starts_at));

        let jobs = reminder_and_followup_jobs(&booking, now);
        let types: Vec<JobType> = jobs.iter().map(|(t, _)| *t).collect();
        assert!(!types.contains(&JobType::Reminder24h));
        assert!(!types.contains(&JobType::Reminder2h));
    }

    #[test]
    fn debounce_bucket_is_stable_within_the_same_minute() {
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 10).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 40).unwrap();
        let t3 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 1, 5).unwrap();

        let booking_id = "booking-1";
        assert_eq!(debounced_dedupe_key(booking_id, t1), debounced_dedupe_key(booking_id, t2));
        assert_ne!(debounced_dedupe_key(booking_id, t1), debounced_dedupe_key(booking_id, t3));
    }

    #[test]
    fn no_starts_at_skips_reminders_and_followups() {
        let now = Utc::now();
        let booking = booking_at(None);
        assert!(reminder_and_followup_jobs(&booking, now).is_empty());
    }
}
