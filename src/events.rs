use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{NackError, Result};
use crate::models::{
    Event, HostedImage, Payment, PaymentPurpose, PaymentStatus, Ticket, TicketStatus, new_id,
};
use crate::store::{Store, Transaction};
use crate::validation::{require_non_negative, require_positive, require_text, validate_whatsapp};

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: u32,
    pub ticket_price: i64,
    #[serde(default)]
    pub image: Option<HostedImage>,
    #[serde(default)]
    pub published: bool,
}

impl EventInput {
    fn validate(&self) -> Result<String> {
        let title = require_text("title", &self.title)?;
        require_positive("capacity", self.capacity)?;
        require_non_negative("ticket price", self.ticket_price)?;
        if let Some(ends_at) = self.ends_at {
            if ends_at < self.starts_at {
                return Err(NackError::invalid("an event cannot end before it starts"));
            }
        }
        Ok(title)
    }
}

pub fn create_event(
    store: &Store,
    establishment_id: &str,
    input: EventInput,
    now: DateTime<Utc>,
) -> Result<Event> {
    let title = input.validate()?;
    store.put(Event {
        id: new_id(),
        establishment_id: establishment_id.to_string(),
        title,
        description: input.description,
        venue: input.venue,
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        capacity: input.capacity,
        ticket_price: input.ticket_price,
        image: input.image,
        published: input.published,
        created_at: now,
        updated_at: now,
    })
}

/// Capacity cannot drop below the seats already sold
pub fn update_event(
    store: &Store,
    establishment_id: &str,
    event_id: &str,
    input: EventInput,
    now: DateTime<Utc>,
) -> Result<Event> {
    let title = input.validate()?;
    store.transaction(|tx| {
        let taken = seats_taken(tx, establishment_id, event_id, now);
        if input.capacity < taken {
            return Err(NackError::Conflict(format!(
                "{} seats are already sold",
                taken
            )));
        }

        let mut event = tx.require::<Event>(establishment_id, event_id)?.clone();
        event.title = title;
        event.description = input.description;
        event.venue = input.venue;
        event.starts_at = input.starts_at;
        event.ends_at = input.ends_at;
        event.capacity = input.capacity;
        event.ticket_price = input.ticket_price;
        event.image = input.image;
        event.published = input.published;
        event.updated_at = now;
        tx.put(event.clone());
        Ok(event)
    })
}

/// How long an unpaid ticket holds its seats
pub const PENDING_TICKET_MINUTES: i64 = 30;

/// Unpaid ticket whose hold has run out
fn is_stale(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    ticket.status == TicketStatus::Pending
        && ticket.created_at + Duration::minutes(PENDING_TICKET_MINUTES) <= now
}

/// Seats held by paid tickets and by unpaid ones still within their hold
pub fn seats_taken(
    tx: &Transaction<'_>,
    establishment_id: &str,
    event_id: &str,
    now: DateTime<Utc>,
) -> u32 {
    count_seats(
        tx.list::<Ticket>(establishment_id)
            .into_iter()
            .filter(|t| t.event_id == event_id),
        now,
    )
}

fn count_seats<'a>(tickets: impl Iterator<Item = &'a Ticket>, now: DateTime<Utc>) -> u32 {
    tickets
        .filter(|t| t.status != TicketStatus::Cancelled && !is_stale(t, now))
        .map(|t| t.quantity)
        .fold(0u32, u32::saturating_add)
}

/// Mark the pending gateway payments of a ticket as failed
fn fail_ticket_payments(
    tx: &mut Transaction<'_>,
    establishment_id: &str,
    ticket_id: &str,
    now: DateTime<Utc>,
) {
    let open: Vec<Payment> = tx
        .list::<Payment>(establishment_id)
        .into_iter()
        .filter(|p| {
            p.status == PaymentStatus::Pending
                && matches!(&p.purpose, PaymentPurpose::Ticket { ticket_id: t } if t == ticket_id)
        })
        .cloned()
        .collect();
    for mut payment in open {
        payment.status = PaymentStatus::Failed;
        payment.updated_at = now;
        tx.put(payment);
    }
}

/// Cancel the event's unpaid tickets past their hold
fn release_stale(
    tx: &mut Transaction<'_>,
    establishment_id: &str,
    event_id: &str,
    now: DateTime<Utc>,
) -> usize {
    let stale: Vec<Ticket> = tx
        .list::<Ticket>(establishment_id)
        .into_iter()
        .filter(|t| t.event_id == event_id && is_stale(t, now))
        .cloned()
        .collect();
    let released = stale.len();
    for mut ticket in stale {
        fail_ticket_payments(tx, establishment_id, &ticket.id, now);
        ticket.status = TicketStatus::Cancelled;
        ticket.updated_at = now;
        tx.put(ticket);
    }
    released
}

/// Capacity figures shown next to an event
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub capacity: u32,
    pub sold: u32,
    pub remaining: u32,
}

pub fn availability(store: &Store, event: &Event, now: DateTime<Utc>) -> Availability {
    let tickets = store.list::<Ticket>(&event.establishment_id);
    let sold = count_seats(tickets.iter().filter(|t| t.event_id == event.id), now);
    Availability {
        capacity: event.capacity,
        sold,
        remaining: event.capacity.saturating_sub(sold),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub buyer_name: String,
    pub buyer_phone: String,
    pub quantity: u32,
}

/// Reserve seats for an event
///
/// Paying events leave the ticket `pending` until the payment is confirmed;
/// free tickets are `paid` right away. Unpaid tickets older than
/// [`PENDING_TICKET_MINUTES`] are cancelled first so they stop holding seats.
pub fn reserve(
    store: &Store,
    establishment_id: &str,
    event_id: &str,
    request: TicketRequest,
    now: DateTime<Utc>,
) -> Result<Ticket> {
    let buyer_name = require_text("buyer name", &request.buyer_name)?;
    let buyer_phone = validate_whatsapp(&request.buyer_phone)?;
    let quantity = require_positive("quantity", request.quantity)?;

    let ticket = store.transaction(|tx| {
        let event = tx.require::<Event>(establishment_id, event_id)?.clone();
        let released = release_stale(tx, establishment_id, event_id, now);
        if released > 0 {
            info!("Released {} unpaid ticket(s) of event {}", released, event_id);
        }
        let remaining = event
            .capacity
            .saturating_sub(seats_taken(tx, establishment_id, event_id, now));
        if quantity > remaining {
            return Err(NackError::SoldOut { remaining });
        }

        let amount = event
            .ticket_price
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| NackError::invalid("ticket amount is too large"))?;
        let ticket = Ticket {
            id: new_id(),
            establishment_id: establishment_id.to_string(),
            event_id: event.id,
            buyer_name,
            buyer_phone,
            quantity,
            amount,
            status: if amount == 0 {
                TicketStatus::Paid
            } else {
                TicketStatus::Pending
            },
            payment_reference: None,
            checked_in_at: None,
            created_at: now,
            updated_at: now,
        };
        tx.put(ticket.clone());
        Ok(ticket)
    })?;

    info!(
        "Reserved {} seat(s) for event {} ({})",
        ticket.quantity, event_id, ticket.status
    );
    Ok(ticket)
}

/// Mark a pending ticket as paid; paying twice is harmless
pub fn mark_paid(
    store: &Store,
    establishment_id: &str,
    ticket_id: &str,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<Ticket> {
    store.update::<Ticket, _>(establishment_id, ticket_id, |ticket| {
        match ticket.status {
            TicketStatus::Paid => return Ok(()),
            TicketStatus::Cancelled => {
                return Err(NackError::InvalidTransition {
                    from: ticket.status.to_string(),
                    to: TicketStatus::Paid.to_string(),
                });
            }
            TicketStatus::Pending => {}
        }
        ticket.status = TicketStatus::Paid;
        if reference.is_some() {
            ticket.payment_reference = reference;
        }
        ticket.updated_at = now;
        Ok(())
    })
}

/// Cancel a ticket and free its seats; a used ticket cannot be cancelled
///
/// A payment still open for the ticket is marked failed so a late gateway
/// confirmation cannot settle it.
pub fn cancel(
    store: &Store,
    establishment_id: &str,
    ticket_id: &str,
    now: DateTime<Utc>,
) -> Result<Ticket> {
    store.transaction(|tx| {
        let mut ticket = tx.require::<Ticket>(establishment_id, ticket_id)?.clone();
        if ticket.status == TicketStatus::Cancelled {
            return Ok(ticket);
        }
        if ticket.checked_in_at.is_some() {
            return Err(NackError::Conflict("ticket was already used".to_string()));
        }
        fail_ticket_payments(tx, establishment_id, ticket_id, now);
        ticket.status = TicketStatus::Cancelled;
        ticket.updated_at = now;
        tx.put(ticket.clone());
        Ok(ticket)
    })
}

/// Admit the holder of a paid ticket at the door
pub fn check_in(
    store: &Store,
    establishment_id: &str,
    ticket_id: &str,
    now: DateTime<Utc>,
) -> Result<Ticket> {
    store.update::<Ticket, _>(establishment_id, ticket_id, |ticket| {
        if ticket.status != TicketStatus::Paid {
            return Err(NackError::Conflict(format!("ticket is {}", ticket.status)));
        }
        if let Some(at) = ticket.checked_in_at {
            return Err(NackError::Conflict(format!(
                "ticket already checked in at {}",
                at.format("%d/%m/%Y %H:%M")
            )));
        }
        ticket.checked_in_at = Some(now);
        ticket.updated_at = now;
        Ok(())
    })
}

/// Text encoded in the ticket's QR code
///
/// # Examples
/// ```
/// assert_eq!(nack::events::ticket_qr_payload("bar", "t1"), "NACK:TICKET:bar:t1");
/// ```
pub fn ticket_qr_payload(establishment_id: &str, ticket_id: &str) -> String {
    format!("NACK:TICKET:{}:{}", establishment_id, ticket_id)
}

/// Split a scanned payload back into establishment and ticket ids
pub fn parse_qr_payload(payload: &str) -> Option<(&str, &str)> {
    let rest = payload.trim().strip_prefix("NACK:TICKET:")?;
    let (establishment_id, ticket_id) = rest.split_once(':')?;
    if establishment_id.is_empty() || ticket_id.is_empty() {
        return None;
    }
    Some((establishment_id, ticket_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(store: &Store, capacity: u32, price: i64) -> Event {
        let now = Utc::now();
        create_event(
            store,
            "bar",
            EventInput {
                title: "Soirée Zouk".to_string(),
                description: String::new(),
                venue: "Libreville".to_string(),
                starts_at: now + Duration::days(3),
                ends_at: None,
                capacity,
                ticket_price: price,
                image: None,
                published: true,
            },
            now,
        )
        .unwrap()
    }

    fn request(quantity: u32) -> TicketRequest {
        TicketRequest {
            buyer_name: "Paul".to_string(),
            buyer_phone: "+241 06 11 22 33".to_string(),
            quantity,
        }
    }

    #[test]
    fn capacity_is_never_oversold() {
        let store = Store::in_memory();
        let e = event(&store, 5, 5_000);
        let now = Utc::now();

        let first = reserve(&store, "bar", &e.id, request(3), now).unwrap();
        assert_eq!(first.amount, 15_000);
        assert_eq!(first.status, TicketStatus::Pending);
        assert_eq!(first.buyer_phone, "+24106112233");

        assert!(matches!(
            reserve(&store, "bar", &e.id, request(3), now),
            Err(NackError::SoldOut { remaining: 2 })
        ));

        cancel(&store, "bar", &first.id, now).unwrap();
        reserve(&store, "bar", &e.id, request(5), now).unwrap();
        assert_eq!(availability(&store, &e, now).remaining, 0);
    }

    fn open_payment_for(store: &Store, ticket: &Ticket) -> Payment {
        store
            .put(Payment {
                id: "NACK-TEST0001".to_string(),
                establishment_id: "bar".to_string(),
                purpose: PaymentPurpose::Ticket {
                    ticket_id: ticket.id.clone(),
                },
                amount: ticket.amount,
                status: PaymentStatus::Pending,
                link: Some("https://pay.example/1".to_string()),
                created_at: ticket.created_at,
                updated_at: ticket.created_at,
            })
            .unwrap()
    }

    #[test]
    fn unpaid_tickets_stop_holding_seats() {
        let store = Store::in_memory();
        let e = event(&store, 4, 5_000);
        let now = Utc::now();
        let earlier = now - Duration::minutes(PENDING_TICKET_MINUTES + 1);

        let abandoned = reserve(&store, "bar", &e.id, request(4), earlier).unwrap();
        let payment = open_payment_for(&store, &abandoned);
        assert_eq!(availability(&store, &e, earlier).remaining, 0);
        assert_eq!(availability(&store, &e, now).remaining, 4);

        let fresh = reserve(&store, "bar", &e.id, request(4), now).unwrap();
        assert_eq!(fresh.status, TicketStatus::Pending);

        let abandoned = store.require::<Ticket>("bar", &abandoned.id).unwrap();
        assert_eq!(abandoned.status, TicketStatus::Cancelled);
        let payment = store.require::<Payment>("bar", &payment.id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn cancelling_closes_the_open_payment() {
        let store = Store::in_memory();
        let e = event(&store, 4, 5_000);
        let now = Utc::now();
        let ticket = reserve(&store, "bar", &e.id, request(2), now).unwrap();
        let payment = open_payment_for(&store, &ticket);

        cancel(&store, "bar", &ticket.id, now).unwrap();
        let payment = store.require::<Payment>("bar", &payment.id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn ticket_amount_overflow_is_refused() {
        let store = Store::in_memory();
        let e = event(&store, 10, i64::MAX / 2);
        assert!(matches!(
            reserve(&store, "bar", &e.id, request(3), Utc::now()),
            Err(NackError::Validation(_))
        ));
        assert!(store.list::<Ticket>("bar").is_empty());
    }

    #[test]
    fn free_tickets_are_paid() {
        let store = Store::in_memory();
        let e = event(&store, 50, 0);
        let t = reserve(&store, "bar", &e.id, request(2), Utc::now()).unwrap();
        assert_eq!(t.status, TicketStatus::Paid);
        assert_eq!(t.amount, 0);
    }

    #[test]
    fn check_in_only_once_and_only_paid() {
        let store = Store::in_memory();
        let e = event(&store, 10, 2_000);
        let now = Utc::now();
        let t = reserve(&store, "bar", &e.id, request(1), now).unwrap();

        assert!(check_in(&store, "bar", &t.id, now).is_err());
        mark_paid(&store, "bar", &t.id, Some("NACK-1".to_string()), now).unwrap();
        let paid = mark_paid(&store, "bar", &t.id, None, now).unwrap();
        assert_eq!(paid.payment_reference.as_deref(), Some("NACK-1"));

        let admitted = check_in(&store, "bar", &t.id, now).unwrap();
        assert_eq!(admitted.checked_in_at, Some(now));
        assert!(check_in(&store, "bar", &t.id, now).is_err());
        assert!(cancel(&store, "bar", &t.id, now).is_err());
    }

    #[test]
    fn capacity_cannot_shrink_below_sales() {
        let store = Store::in_memory();
        let e = event(&store, 10, 1_000);
        let now = Utc::now();
        reserve(&store, "bar", &e.id, request(4), now).unwrap();

        let input = |capacity| EventInput {
            title: e.title.clone(),
            description: String::new(),
            venue: e.venue.clone(),
            starts_at: e.starts_at,
            ends_at: None,
            capacity,
            ticket_price: 1_000,
            image: None,
            published: true,
        };
        assert!(update_event(&store, "bar", &e.id, input(3), now).is_err());
        assert_eq!(update_event(&store, "bar", &e.id, input(4), now).unwrap().capacity, 4);
    }

    #[test]
    fn invalid_requests() {
        let store = Store::in_memory();
        let e = event(&store, 10, 1_000);
        let now = Utc::now();
        assert!(reserve(&store, "bar", &e.id, request(0), now).is_err());
        let mut bad_phone = request(1);
        bad_phone.buyer_phone = "+33612345678".to_string();
        assert!(reserve(&store, "bar", &e.id, bad_phone, now).is_err());
        assert!(matches!(
            reserve(&store, "other", &e.id, request(1), now),
            Err(NackError::NotFound("Event"))
        ));
    }

    #[test]
    fn qr_payload_round_trip() {
        let payload = ticket_qr_payload("bar", "t-1");
        assert_eq!(parse_qr_payload(&payload), Some(("bar", "t-1")));
        assert_eq!(parse_qr_payload("NACK:TICKET:bar"), None);
        assert_eq!(parse_qr_payload("hello"), None);
    }
}
