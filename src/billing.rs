//! Payments collected through the mobile-money gateway
//!
//! A payment is recorded as `pending` before the customer is sent to the
//! gateway, and settled when the gateway calls back with its reference.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{NackError, Result};
use crate::models::{Payment, PaymentPurpose, PaymentStatus, Profile, Ticket, TicketStatus, new_id};
use crate::store::Store;
use crate::subscription::{self, PERIOD_DAYS};

/// Reference quoted to the gateway, e.g. `NACK-3F2A9C1B`
pub fn new_reference() -> String {
    let id = new_id().replace('-', "");
    format!("NACK-{}", id[..8].to_uppercase())
}

/// Amount due for a subscription of `months`
pub fn subscription_amount(monthly_price: i64, months: u32) -> Result<i64> {
    if months == 0 || months > 12 {
        return Err(NackError::invalid("subscriptions run from 1 to 12 months"));
    }
    Ok(monthly_price * i64::from(months))
}

/// Record a pending payment
pub fn open_payment(
    store: &Store,
    establishment_id: &str,
    purpose: PaymentPurpose,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Payment> {
    if amount <= 0 {
        return Err(NackError::invalid("payment amount must be positive"));
    }

    store.transaction(|tx| {
        tx.require::<Profile>(establishment_id, establishment_id)?;
        if let PaymentPurpose::Ticket { ticket_id } = &purpose {
            let ticket = tx.require::<Ticket>(establishment_id, ticket_id)?;
            if ticket.status != TicketStatus::Pending {
                return Err(NackError::Conflict(format!("ticket is {}", ticket.status)));
            }
        }

        let payment = Payment {
            id: new_reference(),
            establishment_id: establishment_id.to_string(),
            purpose,
            amount,
            status: PaymentStatus::Pending,
            link: None,
            created_at: now,
            updated_at: now,
        };
        tx.put(payment.clone());
        Ok(payment)
    })
}

/// Store the checkout link returned by the gateway
pub fn attach_link(
    store: &Store,
    establishment_id: &str,
    reference: &str,
    link: &str,
    now: DateTime<Utc>,
) -> Result<Payment> {
    store.update::<Payment, _>(establishment_id, reference, |payment| {
        payment.link = Some(link.to_string());
        payment.updated_at = now;
        Ok(())
    })
}

/// Settle a payment reported by the gateway
///
/// Settling is idempotent: a payment that is no longer pending is returned
/// as is. A successful subscription payment extends the establishment by
/// 30 days per month bought; a successful ticket payment marks the ticket
/// paid. A failed ticket payment releases the seats.
pub fn confirm_payment(
    store: &Store,
    reference: &str,
    success: bool,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let payment = store
        .find::<Payment>(reference)
        .ok_or(NackError::NotFound("Payment"))?;
    if payment.status != PaymentStatus::Pending {
        info!("Payment {} already settled ({:?})", reference, payment.status);
        return Ok(payment);
    }

    let establishment_id = payment.establishment_id.clone();
    let settled = store.transaction(|tx| {
        let mut payment = tx.require::<Payment>(&establishment_id, reference)?.clone();
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        match (&payment.purpose, success) {
            (PaymentPurpose::Subscription { months }, true) => {
                let mut profile = tx
                    .require::<Profile>(&establishment_id, &establishment_id)?
                    .clone();
                let ends = subscription::extend(
                    &mut profile,
                    i64::from(*months) * PERIOD_DAYS,
                    now,
                );
                info!("Subscription of {} extended to {}", establishment_id, ends);
                tx.put(profile);
            }
            (PaymentPurpose::Ticket { ticket_id }, paid) => {
                if let Some(ticket) = tx.get::<Ticket>(&establishment_id, ticket_id) {
                    let mut ticket = ticket.clone();
                    if ticket.status == TicketStatus::Pending {
                        ticket.status = if paid {
                            TicketStatus::Paid
                        } else {
                            TicketStatus::Cancelled
                        };
                        ticket.payment_reference = Some(payment.id.clone());
                        ticket.updated_at = now;
                        tx.put(ticket);
                    }
                } else {
                    warn!("Payment {} refers to a missing ticket {}", reference, ticket_id);
                }
            }
            (PaymentPurpose::Subscription { .. }, false) => {}
        }

        payment.status = if success {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };
        payment.updated_at = now;
        tx.put(payment.clone());
        Ok(payment)
    })?;

    info!("Payment {} settled as {:?}", reference, settled.status);
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventInput, TicketRequest, create_event, reserve};
    use crate::subscription::Plan;
    use chrono::Duration;

    fn establishment(store: &Store, now: DateTime<Utc>) -> Profile {
        let mut profile = Profile::new("Le Phare", "Joël", "joel@phare.ga", "+24107001122", "h", now);
        subscription::start_trial(&mut profile, now);
        store.put(profile).unwrap()
    }

    #[test]
    fn references_look_alike() {
        let reference = new_reference();
        assert!(reference.starts_with("NACK-"));
        assert_eq!(reference.len(), 13);
        assert_ne!(reference, new_reference());
    }

    #[test]
    fn subscription_payment_extends_once() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = establishment(&store, now);

        let amount = subscription_amount(15_000, 2).unwrap();
        let payment = open_payment(
            &store,
            &profile.id,
            PaymentPurpose::Subscription { months: 2 },
            amount,
            now,
        )
        .unwrap();
        assert_eq!(payment.amount, 30_000);

        confirm_payment(&store, &payment.id, true, now).unwrap();
        let again = confirm_payment(&store, &payment.id, true, now).unwrap();
        assert_eq!(again.status, PaymentStatus::Paid);

        let profile = store.require::<Profile>(&profile.id, &profile.id).unwrap();
        assert_eq!(profile.plan, Plan::Active);
        assert_eq!(profile.subscription_ends_at, Some(now + Duration::days(60)));
    }

    #[test]
    fn failed_ticket_payment_releases_seats() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = establishment(&store, now);
        let event = create_event(
            &store,
            &profile.id,
            EventInput {
                title: "Concert".to_string(),
                description: String::new(),
                venue: String::new(),
                starts_at: now + Duration::days(1),
                ends_at: None,
                capacity: 2,
                ticket_price: 3_000,
                image: None,
                published: true,
            },
            now,
        )
        .unwrap();
        let ticket = reserve(
            &store,
            &profile.id,
            &event.id,
            TicketRequest {
                buyer_name: "Marc".to_string(),
                buyer_phone: "+24106000001".to_string(),
                quantity: 2,
            },
            now,
        )
        .unwrap();

        let payment = open_payment(
            &store,
            &profile.id,
            PaymentPurpose::Ticket {
                ticket_id: ticket.id.clone(),
            },
            ticket.amount,
            now,
        )
        .unwrap();
        let failed = confirm_payment(&store, &payment.id, false, now).unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);

        let ticket = store.require::<Ticket>(&profile.id, &ticket.id).unwrap();
        assert_eq!(ticket.status, TicketStatus::Cancelled);

        // A late success does not resurrect the payment
        let late = confirm_payment(&store, &payment.id, true, now).unwrap();
        assert_eq!(late.status, PaymentStatus::Failed);
    }

    #[test]
    fn rejects_bad_payments() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = establishment(&store, now);
        assert!(subscription_amount(15_000, 0).is_err());
        assert!(
            open_payment(&store, &profile.id, PaymentPurpose::Subscription { months: 1 }, 0, now)
                .is_err()
        );
        assert!(matches!(
            confirm_payment(&store, "NACK-UNKNOWN", true, now),
            Err(NackError::NotFound("Payment"))
        ));
    }
}
