//! Picks which sender identity a message for a given booking goes out
//! from, based on the booking's lowest-numbered service and the company's
//! routing rules.

use sqlx::{Postgres, Transaction};

use crate::common::SenderId;
use crate::models::DEFAULT_SENDER_CODE;

/// Returns the routing sender code for `booking_id`'s first service
/// (ascending `serviceId`), or `"default"` if no rule matches or the
/// booking has no services.
pub async fn pick_sender_code_for_booking(
    tx: &mut Transaction<'_, Postgres>,
    company_id: i64,
    booking_id: crate::common::BookingId,
) -> sqlx::Result<String> {
    let first_service_id: Option<i64> = sqlx::query_scalar(
        "SELECT service_id FROM booking_services WHERE booking_id = $1 ORDER BY service_id ASC LIMIT 1",
    )
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(service_id) = first_service_id else {
        return Ok(DEFAULT_SENDER_CODE.to_owned());
    };

    let sender_code: Option<String> = sqlx::query_scalar(
        "SELECT sender_code FROM service_sender_rules WHERE company_id = $1 AND service_id = $2",
    )
    .bind(company_id)
    .bind(service_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(sender_code.unwrap_or_else(|| DEFAULT_SENDER_CODE.to_owned()))
}

/// Resolves a sender code to an active sender's id, falling back to the
/// `"default"` sender code if the requested one has no active sender.
pub async fn pick_sender_id(
    tx: &mut Transaction<'_, Postgres>,
    company_id: i64,
    sender_code: &str,
) -> sqlx::Result<Option<SenderId>> {
    let found: Option<SenderId> = sqlx::query_scalar(
        "SELECT id FROM senders WHERE company_id = $1 AND sender_code = $2 AND is_active = true",
    )
    .bind(company_id)
    .bind(sender_code)
    .fetch_optional(&mut **tx)
    .await?;

    if found.is_some() || sender_code == DEFAULT_SENDER_CODE {
        return Ok(found);
    }

    sqlx::query_scalar(
        "SELECT id FROM senders WHERE company_id = $1 AND sender_code = $2 AND is_active = true",
    )
    .bind(company_id)
    .bind(DEFAULT_SENDER_CODE)
    .fetch_optional(&mut **tx)
    .await
}
