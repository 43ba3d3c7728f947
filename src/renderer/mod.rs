//! Loads a template with language fallback and substitutes its named
//! placeholders against a booking/client pair, resolving the sending
//! identity along the way.

use std::collections::HashMap;
use std::fmt::Write as _;

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::common::time::{format_local_date, format_local_time};
use crate::common::SenderId;
use crate::models::{Booking, BookingService, Client, Template, DEFAULT_LANGUAGE};
use crate::router;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no active template for company {company_id}, code {code:?}")]
    TemplateNotFound { company_id: i64, code: String },
    #[error("template references unknown placeholder {0:?}")]
    UnknownPlaceholder(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const KNOWN_PLACEHOLDERS: &[&str] = &[
    "client_name",
    "staff_name",
    "date",
    "time",
    "services",
    "total_cost",
    "short_link",
    "unsubscribe_link",
    "sender_id",
    "sender_code",
    "pre_appointment_notes",
    "primary_service",
];

const FIRST_VISIT_NOTES_DE: &str = "Hinweise vor deinem ersten Termin: Bitte komme 5 Minuten \
vor dem vereinbarten Termin, damit wir uns in Ruhe auf die Behandlung vorbereiten können. \
Solltest du den Termin nicht wahrnehmen können, sage bitte mindestens 24 Stunden vorher ab.";

pub struct RenderedMessage {
    pub body: String,
    pub sender_id: Option<SenderId>,
    pub sender_code: String,
    pub language: String,
}

async fn lookup_template(
    tx: &mut Transaction<'_, Postgres>,
    company_id: i64,
    code: &str,
    preferred_language: &str,
) -> Result<Template, RenderError> {
    if let Some(t) = sqlx::query_as::<_, Template>(
        "SELECT * FROM templates WHERE company_id = $1 AND code = $2 AND language = $3 AND is_active = true",
    )
    .bind(company_id)
    .bind(code)
    .bind(preferred_language)
    .fetch_optional(&mut **tx)
    .await?
    {
        return Ok(t);
    }

    if preferred_language != DEFAULT_LANGUAGE {
        if let Some(t) = sqlx::query_as::<_, Template>(
            "SELECT * FROM templates WHERE company_id = $1 AND code = $2 AND language = $3 AND is_active = true",
        )
        .bind(company_id)
        .bind(code)
        .bind(DEFAULT_LANGUAGE)
        .fetch_optional(&mut **tx)
        .await?
        {
            return Ok(t);
        }
    }

    sqlx::query_as::<_, Template>(
        "SELECT * FROM templates WHERE company_id = $1 AND code = $2 AND is_active = true ORDER BY id ASC LIMIT 1",
    )
    .bind(company_id)
    .bind(code)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| RenderError::TemplateNotFound {
        company_id,
        code: code.to_owned(),
    })
}

fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn services_line(service: &BookingService) -> String {
    let title = service.title.as_deref().unwrap_or("");
    let cost = service.cost_to_pay.unwrap_or(Decimal::ZERO);
    format!("{title} — {}€", format_money(cost))
}

async fn is_first_visit(
    tx: &mut Transaction<'_, Postgres>,
    company_id: i64,
    client_id: crate::common::ClientId,
    booking_id: crate::common::BookingId,
    starts_at: chrono::DateTime<chrono::Utc>,
) -> sqlx::Result<bool> {
    let prior_count: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*) FROM bookings
        WHERE company_id = $1 AND client_id = $2 AND id <> $3 AND starts_at < $4
        "#,
    )
    .bind(company_id)
    .bind(client_id)
    .bind(booking_id)
    .bind(starts_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok(prior_count == 0)
}

async fn build_placeholders(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
    language: &str,
    booking: &Booking,
    client: &Client,
    sender_code: &str,
    sender_id: Option<SenderId>,
) -> Result<HashMap<&'static str, String>, RenderError> {
    let services: Vec<BookingService> = sqlx::query_as(
        "SELECT * FROM booking_services WHERE booking_id = $1 ORDER BY service_id ASC",
    )
    .bind(booking.id)
    .fetch_all(&mut **tx)
    .await?;

    let total_cost: Decimal = services
        .iter()
        .filter_map(|s| s.cost_to_pay)
        .fold(Decimal::ZERO, |acc, v| acc + v);

    let services_text = services
        .iter()
        .fold(String::new(), |mut acc, s| {
            if !acc.is_empty() {
                acc.push('\n');
            }
            let _ = write!(acc, "{}", services_line(s));
            acc
        });

    let primary_service = services
        .first()
        .and_then(|s| s.title.clone())
        .unwrap_or_default();

    let pre_appointment_notes = if code == "record_created" && language == "de" {
        match booking.starts_at {
            Some(starts_at) => {
                if is_first_visit(tx, booking.company_id, client.id, booking.id, starts_at).await? {
                    FIRST_VISIT_NOTES_DE.to_owned()
                } else {
                    String::new()
                }
            }
            None => String::new(),
        }
    } else {
        String::new()
    };

    let mut placeholders = HashMap::new();
    placeholders.insert("client_name", client.display_name.clone().unwrap_or_default());
    placeholders.insert("staff_name", booking.staff_name.clone().unwrap_or_default());
    placeholders.insert(
        "date",
        booking.starts_at.map(format_local_date).unwrap_or_default(),
    );
    placeholders.insert(
        "time",
        booking.starts_at.map(format_local_time).unwrap_or_default(),
    );
    placeholders.insert("services", services_text);
    placeholders.insert("total_cost", format_money(total_cost));
    placeholders.insert("short_link", booking.short_link.clone().unwrap_or_default());
    placeholders.insert("unsubscribe_link", String::new());
    placeholders.insert(
        "sender_id",
        sender_id.map(|s| s.to_string()).unwrap_or_default(),
    );
    placeholders.insert("sender_code", sender_code.to_owned());
    placeholders.insert("pre_appointment_notes", pre_appointment_notes);
    placeholders.insert("primary_service", primary_service);

    Ok(placeholders)
}

/// Substitutes `{placeholder}` occurrences in `template_body`. Any brace
/// pair whose contents aren't in [`KNOWN_PLACEHOLDERS`] is a render error —
/// templates are trusted content, but typos shouldn't ship to clients
/// silently.
fn substitute(template_body: &str, placeholders: &HashMap<&'static str, String>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template_body.len());
    let mut rest = template_body;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let name = &after_open[..close];
        match placeholders.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(RenderError::UnknownPlaceholder(name.to_owned())),
        }

        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

pub async fn render(
    tx: &mut Transaction<'_, Postgres>,
    company_id: i64,
    code: &str,
    booking: &Booking,
    client: &Client,
    preferred_language: &str,
) -> Result<RenderedMessage, RenderError> {
    let template = lookup_template(tx, company_id, code, preferred_language).await?;

    let sender_code = router::pick_sender_code_for_booking(tx, company_id, booking.id).await?;
    let sender_id = router::pick_sender_id(tx, company_id, &sender_code).await?;

    let placeholders = build_placeholders(
        tx,
        code,
        &template.language,
        booking,
        client,
        &sender_code,
        sender_id,
    )
    .await?;

    let body = substitute(&template.body, &placeholders)?;

    Ok(RenderedMessage {
        body,
        sender_id,
        sender_code,
        language: template.language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_known_placeholders() {
        let mut placeholders = HashMap::new();
        placeholders.insert("client_name", "Anna".to_owned());
        let result = substitute("Hallo {client_name}!", &placeholders).unwrap();
        assert_eq!(result, "Hallo Anna!");
    }

    #[test]
    fn substitute_rejects_unknown_placeholder() {
        let placeholders = HashMap::new();
        let result = substitute("Hallo {bogus}!", &placeholders);
        assert!(matches!(result, Err(RenderError::UnknownPlaceholder(_))));
    }

    #[test]
    fn substitute_handles_no_placeholders() {
        let placeholders = HashMap::new();
        assert_eq!(substitute("plain text", &placeholders).unwrap(), "plain text");
    }

    #[test]
    fn format_money_always_two_decimals() {
        assert_eq!(format_money(Decimal::new(5, 0)), "5.00");
        assert_eq!(format_money(Decimal::ZERO), "0.00");
    }
}
