#![cfg(feature = "web")]
//! Printable receipts and tickets

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageOutputFormat, Luma};
use qrcode::QrCode;
use serde::Serialize;
use std::io::Cursor;

use crate::error::{NackError, Result};
use crate::events::ticket_qr_payload;
use crate::models::{Event, Order, Profile, Table, Ticket};
use crate::orders::short_ref;
use crate::reports::format_fcfa;
use crate::templates::render;

/// Side of the rendered QR code, in pixels
const QR_SIZE: u32 = 240;

/// Encode `payload` as a QR code PNG
pub fn qr_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| NackError::Internal(format!("cannot encode QR code: {}", e)))?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| NackError::Internal(format!("cannot write PNG: {}", e)))?;
    Ok(png.into_inner())
}

/// PNG bytes as an inline `data:` URI
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[derive(Serialize)]
struct ReceiptLine {
    quantity: u32,
    name: String,
    total: String,
}

#[derive(Serialize)]
struct ReceiptView {
    establishment_name: String,
    address: Option<String>,
    whatsapp: String,
    reference: String,
    date: String,
    table: Option<String>,
    served_by: Option<String>,
    lines: Vec<ReceiptLine>,
    total: String,
    payment_method: &'static str,
    note: Option<String>,
}

fn payment_label(order: &Order) -> &'static str {
    use crate::models::PaymentMethod::*;
    match order.payment_method {
        Cash => "Espèces",
        AirtelMoney => "Airtel Money",
        MoovMoney => "Moov Money",
        Card => "Carte bancaire",
    }
}

/// HTML receipt for one order
pub fn receipt_html(
    profile: &Profile,
    order: &Order,
    table: Option<&Table>,
    served_by: Option<&str>,
) -> Result<String> {
    let view = ReceiptView {
        establishment_name: profile.establishment_name.clone(),
        address: profile.address.clone(),
        whatsapp: profile.whatsapp.clone(),
        reference: short_ref(&order.id),
        date: order.created_at.format("%d/%m/%Y %H:%M").to_string(),
        table: table.map(|t| t.name.clone()),
        served_by: served_by.map(str::to_string),
        lines: order
            .items
            .iter()
            .map(|item| ReceiptLine {
                quantity: item.quantity,
                name: item.name.clone(),
                total: format_fcfa(item.line_total()),
            })
            .collect(),
        total: format_fcfa(order.total),
        payment_method: payment_label(order),
        note: order.note.clone(),
    };
    render("receipt", &view)
}

#[derive(Serialize)]
struct TicketView {
    establishment_name: String,
    event_title: String,
    venue: String,
    starts_at: String,
    buyer_name: String,
    quantity: u32,
    amount: String,
    status: String,
    reference: String,
    qr_data_uri: String,
}

/// HTML ticket with its QR code inlined
pub fn ticket_html(profile: &Profile, event: &Event, ticket: &Ticket) -> Result<String> {
    let qr = qr_png(&ticket_qr_payload(&ticket.establishment_id, &ticket.id))?;
    let view = TicketView {
        establishment_name: profile.establishment_name.clone(),
        event_title: event.title.clone(),
        venue: event.venue.clone(),
        starts_at: event.starts_at.format("%d/%m/%Y %H:%M").to_string(),
        buyer_name: ticket.buyer_name.clone(),
        quantity: ticket.quantity,
        amount: if ticket.amount == 0 {
            "Entrée libre".to_string()
        } else {
            format_fcfa(ticket.amount)
        },
        status: ticket.status.to_string(),
        reference: short_ref(&ticket.id),
        qr_data_uri: png_data_uri(&qr),
    };
    render("ticket", &view)
}
