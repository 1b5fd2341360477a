//! Events and door control

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::SharedState;
use crate::error::{NackError, Result};
use crate::events::{self, Availability, EventInput, parse_qr_payload, ticket_qr_payload};
use crate::login::CurrentUser;
use crate::models::{Event, Ticket};
use crate::receipt::qr_png;

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub availability: Availability,
}

/// Every event, upcoming first
pub async fn list_events(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Vec<EventView>> {
    let now = Utc::now();
    let mut all = state.store.list::<Event>(&user.establishment_id);
    all.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
    Json(
        all.into_iter()
            .map(|event| EventView {
                availability: events::availability(&state.store, &event, now),
                event,
            })
            .collect(),
    )
}

pub async fn create_event(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<EventInput>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let event = events::create_event(&state.store, &user.establishment_id, input, Utc::now())?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Json<Event>> {
    user.require_manager()?;
    let previous = state.store.require::<Event>(&user.establishment_id, &id)?.image;
    let event = events::update_event(&state.store, &user.establishment_id, &id, input, Utc::now())?;
    if previous != event.image {
        state.images.discard(previous.as_ref()).await;
    }
    Ok(Json(event))
}

pub async fn list_tickets(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Ticket>>> {
    state.store.require::<Event>(&user.establishment_id, &id)?;
    let mut tickets: Vec<Ticket> = state
        .store
        .list::<Ticket>(&user.establishment_id)
        .into_iter()
        .filter(|t| t.event_id == id)
        .collect();
    tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(tickets))
}

#[derive(Debug, Deserialize)]
pub struct Scan {
    /// Text read from the ticket's QR code
    pub payload: String,
}

pub async fn check_in(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(scan): Json<Scan>,
) -> Result<Json<Ticket>> {
    let (establishment_id, ticket_id) =
        parse_qr_payload(&scan.payload).ok_or_else(|| NackError::invalid("not a Nack! ticket"))?;
    if establishment_id != user.establishment_id {
        return Err(NackError::invalid("this ticket belongs to another establishment"));
    }
    Ok(Json(events::check_in(
        &state.store,
        &user.establishment_id,
        ticket_id,
        Utc::now(),
    )?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CashPayment {
    #[serde(default)]
    pub reference: Option<String>,
}

/// Ticket paid at the door or outside the gateway
pub async fn mark_paid(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    payment: Option<Json<CashPayment>>,
) -> Result<Json<Ticket>> {
    let reference = payment.and_then(|Json(p)| p.reference);
    Ok(Json(events::mark_paid(
        &state.store,
        &user.establishment_id,
        &id,
        reference,
        Utc::now(),
    )?))
}

pub async fn cancel_ticket(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>> {
    user.require_manager()?;
    Ok(Json(events::cancel(
        &state.store,
        &user.establishment_id,
        &id,
        Utc::now(),
    )?))
}

pub async fn ticket_qr(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let ticket = state.store.require::<Ticket>(&user.establishment_id, &id)?;
    let png = qr_png(&ticket_qr_payload(&ticket.establishment_id, &ticket.id))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
