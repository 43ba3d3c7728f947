//! Maps a raw Altegio `client`/`record` webhook payload onto the canonical
//! `Client`/`Booking`/`BookingService` shape.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::common::{time::parse_upstream_datetime, BookingId, ClientId};
use crate::models::{BookingService, NewBooking, NewClient};

fn digits_only_e164(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("+{digits}"))
    }
}

fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .or_else(|| n.as_i64().map(Decimal::from)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Extracts a `NewClient` from a nested `client` object, present on both
/// standalone `client` events and nested inside `record` events.
pub fn extract_client(client_data: &Value, company_id: i64) -> Option<NewClient> {
    let external_client_id = client_data.get("id").and_then(Value::as_i64)?;

    Some(NewClient {
        company_id,
        external_client_id,
        phone_e164: client_data
            .get("phone")
            .and_then(Value::as_str)
            .and_then(digits_only_e164),
        display_name: client_data
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned),
        email: client_data
            .get("email")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        raw: client_data.clone(),
    })
}

/// Extracts a `NewBooking` from a `record` payload's `data` object.
pub fn extract_booking(
    data: &Value,
    company_id: i64,
    client_id: Option<ClientId>,
    is_deleted: bool,
) -> Option<NewBooking> {
    let external_booking_id = data.get("id").and_then(Value::as_i64)?;

    let starts_at = data
        .get("datetime")
        .or_else(|| data.get("date"))
        .and_then(Value::as_str)
        .and_then(parse_upstream_datetime);

    let duration_sec = data
        .get("seance_length")
        .or_else(|| data.get("length"))
        .and_then(Value::as_i64)
        .map(|n| n as i32);

    let ends_at = match (starts_at, duration_sec) {
        (Some(start), Some(secs)) => Some(start + chrono::Duration::seconds(secs as i64)),
        _ => None,
    };

    let total_cost = data
        .get("cost_to_pay_total")
        .or_else(|| data.get("cost_to_pay"))
        .and_then(decimal_from);

    Some(NewBooking {
        company_id,
        external_booking_id,
        client_id,
        external_client_id: data
            .get("client")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64),
        staff_id: data.get("staff_id").and_then(Value::as_i64).or_else(|| {
            data.get("staff").and_then(|s| s.get("id")).and_then(Value::as_i64)
        }),
        staff_name: data
            .get("staff")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        starts_at,
        ends_at,
        duration_sec,
        comment: data
            .get("comment")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        short_link: data
            .get("record_hash")
            .and_then(Value::as_str)
            .map(str::to_owned),
        confirmed: data.get("confirmed").and_then(Value::as_bool),
        attendance: data.get("attendance").and_then(Value::as_i64).map(|n| n as i32),
        is_deleted,
        total_cost,
        last_change_at: data
            .get("last_change_date")
            .and_then(Value::as_str)
            .and_then(parse_upstream_datetime),
        raw: data.clone(),
    })
}

pub fn extract_services(data: &Value, booking_id: BookingId) -> Vec<BookingService> {
    data.get("services")
        .and_then(Value::as_array)
        .map(|services| {
            services
                .iter()
                .filter_map(|s| {
                    let service_id = s.get("id").and_then(Value::as_i64)?;
                    Some(BookingService {
                        booking_id,
                        service_id,
                        title: s.get("title").and_then(Value::as_str).map(str::to_owned),
                        amount: s.get("cost").and_then(decimal_from),
                        cost_to_pay: s.get("cost_to_pay").and_then(decimal_from),
                        raw: s.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_client_requires_id() {
        assert!(extract_client(&json!({"name": "no id"}), 1).is_none());
    }

    #[test]
    fn extract_client_normalizes_phone() {
        let client = extract_client(&json!({"id": 1, "phone": "+49 (170) 123-456"}), 1).unwrap();
        assert_eq!(client.phone_e164.as_deref(), Some("+49170123456"));
    }

    #[test]
    fn extract_booking_parses_services_ordered_by_id() {
        let booking_id = BookingId::new();
        let data = json!({
            "services": [
                {"id": 2, "title": "B", "cost": 10, "cost_to_pay": 10},
                {"id": 1, "title": "A", "cost": 20, "cost_to_pay": 20}
            ]
        });
        let services = extract_services(&data, booking_id);
        assert_eq!(services.len(), 2);
    }

    #[test]
    fn extract_booking_requires_id() {
        assert!(extract_booking(&json!({}), 1, None, false).is_none());
    }
}
