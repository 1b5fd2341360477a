//! Routes reachable without a session: digital menu, ticket sales and the
//! payment gateway callback

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use super::notify;
use crate::app::SharedState;
use crate::billing;
use crate::error::{NackError, Result};
use crate::events::{self, Availability, TicketRequest};
use crate::menu::{Menu, build_menu, menu_html};
use crate::models::{Event, Payment, PaymentPurpose, PaymentStatus, Product, Profile, Ticket};
use crate::payment::{CallbackOutcome, GatewayCallback, LinkRequest};
use crate::receipt::ticket_html;
use crate::reports::format_fcfa;
use crate::subscription::derive_plan;

/// Header the gateway echoes the shared callback secret in
const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

fn establishment(state: &SharedState, establishment_id: &str) -> Result<Profile> {
    state.store.require::<Profile>(establishment_id, establishment_id)
}

fn menu_for(state: &SharedState, establishment_id: &str) -> Result<Menu> {
    let profile = establishment(state, establishment_id)?;
    let products = state.store.list::<Product>(establishment_id);
    Ok(build_menu(&profile, &products))
}

pub async fn menu_json(
    State(state): State<SharedState>,
    Path(establishment_id): Path<String>,
) -> Result<Json<Menu>> {
    Ok(Json(menu_for(&state, &establishment_id)?))
}

pub async fn menu_page(
    State(state): State<SharedState>,
    Path(establishment_id): Path<String>,
) -> Result<Html<String>> {
    let menu = menu_for(&state, &establishment_id)?;
    Ok(Html(menu_html(&menu)?))
}

#[derive(Debug, Serialize)]
pub struct PublicEvent {
    #[serde(flatten)]
    pub event: Event,
    pub availability: Availability,
}

/// Published events that have not ended yet, soonest first
pub async fn list_events(
    State(state): State<SharedState>,
    Path(establishment_id): Path<String>,
) -> Result<Json<Vec<PublicEvent>>> {
    establishment(&state, &establishment_id)?;
    let now = Utc::now();
    let mut upcoming: Vec<Event> = state
        .store
        .list::<Event>(&establishment_id)
        .into_iter()
        .filter(|e| e.published && e.ends_at.unwrap_or(e.starts_at) >= now)
        .collect();
    upcoming.sort_by_key(|e| e.starts_at);

    Ok(Json(
        upcoming
            .into_iter()
            .map(|event| PublicEvent {
                availability: events::availability(&state.store, &event, now),
                event,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct TicketPurchase {
    pub ticket: Ticket,
    /// Where to send the buyer to pay; absent for free events
    pub payment_link: Option<String>,
    pub ticket_url: String,
}

/// Reserve seats and, for paying events, open a checkout on the
/// establishment's merchant wallet
pub async fn buy_ticket(
    State(state): State<SharedState>,
    Path((establishment_id, event_id)): Path<(String, String)>,
    Json(request): Json<TicketRequest>,
) -> Result<impl IntoResponse> {
    let profile = establishment(&state, &establishment_id)?;
    if !derive_plan(profile.trial_ends_at, profile.subscription_ends_at, Utc::now()).is_usable() {
        return Err(NackError::SubscriptionExpired);
    }
    let event = state.store.require::<Event>(&establishment_id, &event_id)?;
    if !event.published {
        return Err(NackError::NotFound("Event"));
    }

    let ticket = events::reserve(&state.store, &establishment_id, &event_id, request, Utc::now())?;
    let base = state.config.public_url.trim_end_matches('/');
    let ticket_url = format!("{}/tickets/{}/{}", base, establishment_id, ticket.id);

    let mut payment_link = None;
    if ticket.amount > 0 {
        let payment = billing::open_payment(
            &state.store,
            &establishment_id,
            PaymentPurpose::Ticket {
                ticket_id: ticket.id.clone(),
            },
            ticket.amount,
            Utc::now(),
        )?;
        let link_request = LinkRequest {
            reference: payment.id.clone(),
            amount: payment.amount,
            redirect_success: ticket_url.clone(),
            redirect_error: format!("{}/evenements/{}", base, establishment_id),
            wallet: profile.wallet.clone(),
            disbursement: profile.disbursement_id.clone(),
        };
        match state.gateway.create_link(&link_request).await {
            Ok(link) => {
                billing::attach_link(&state.store, &establishment_id, &payment.id, &link, Utc::now())?;
                payment_link = Some(link);
            }
            Err(e) => {
                // releases the seats
                billing::confirm_payment(&state.store, &payment.id, false, Utc::now())?;
                return Err(e);
            }
        }
    } else {
        notify(
            &state,
            &establishment_id,
            "Nouvelle réservation".to_string(),
            format!("{} : {} place(s)", event.title, ticket.quantity),
            BTreeMap::from([("ticket_id".to_string(), ticket.id.clone())]),
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(TicketPurchase {
            ticket,
            payment_link,
            ticket_url,
        }),
    ))
}

/// Printable ticket; the unguessable ticket id is the only credential
pub async fn ticket_page(
    State(state): State<SharedState>,
    Path((establishment_id, ticket_id)): Path<(String, String)>,
) -> Result<Html<String>> {
    let profile = establishment(&state, &establishment_id)?;
    let ticket = state.store.require::<Ticket>(&establishment_id, &ticket_id)?;
    let event = state.store.require::<Event>(&establishment_id, &ticket.event_id)?;
    Ok(Html(ticket_html(&profile, &event, &ticket)?))
}

/// Settlement notice from the payment gateway
pub async fn payment_callback(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(callback): Json<GatewayCallback>,
) -> Result<(StatusCode, Json<Payment>)> {
    let given = headers
        .get(CALLBACK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.gateway.verify_callback_secret(given) {
        warn!("Rejected payment callback for {}", callback.reference);
        return Err(NackError::Forbidden);
    }

    let current = state
        .store
        .find::<Payment>(&callback.reference)
        .ok_or(NackError::NotFound("Payment"))?;
    let success = match callback.outcome() {
        CallbackOutcome::Succeeded => true,
        CallbackOutcome::Failed => false,
        CallbackOutcome::InProgress => {
            info!(
                "Payment {} still in progress ({})",
                current.id, callback.status
            );
            return Ok((StatusCode::ACCEPTED, Json(current)));
        }
    };

    let was_pending = current.status == PaymentStatus::Pending;
    let payment = billing::confirm_payment(&state.store, &callback.reference, success, Utc::now())?;
    info!("Payment {} is {:?}", payment.id, payment.status);

    if was_pending && payment.status == PaymentStatus::Paid {
        announce_payment(&state, &payment);
    }
    Ok((StatusCode::OK, Json(payment)))
}

fn announce_payment(state: &SharedState, payment: &Payment) {
    let establishment_id = &payment.establishment_id;
    let data = BTreeMap::from([("reference".to_string(), payment.id.clone())]);
    match &payment.purpose {
        PaymentPurpose::Subscription { months } => {
            notify(
                state,
                establishment_id,
                "Abonnement activé".to_string(),
                format!("{} mois payés ({})", months, format_fcfa(payment.amount)),
                data,
            );

            let (Some(mailer), Some(profile)) = (
                state.mailer.clone(),
                state.store.get::<Profile>(establishment_id, establishment_id),
            ) else {
                return;
            };
            let amount = format_fcfa(payment.amount);
            let ends_at = profile
                .subscription_ends_at
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = mailer.send_subscription_receipt(
                    &profile.email,
                    &profile.establishment_name,
                    &amount,
                    &ends_at,
                ) {
                    warn!("Could not mail the receipt of {}: {}", profile.id, e);
                }
            });
        }
        PaymentPurpose::Ticket { .. } => notify(
            state,
            establishment_id,
            "Billet payé".to_string(),
            format_fcfa(payment.amount),
            data,
        ),
    }
}
