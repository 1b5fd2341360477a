//! Orders, receipts and loyalty customers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{notify, profile_of, record_step};
use crate::app::SharedState;
use crate::error::Result;
use crate::inventory::low_stock;
use crate::login::CurrentUser;
use crate::loyalty;
use crate::models::{Customer, Order, OrderStatus, Product, Table, TeamMember};
use crate::orders::{self, NewOrder};
use crate::receipt::receipt_html;
use crate::reports::format_fcfa;
use crate::tutorial::TutorialStep;

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub table_id: Option<String>,
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status == s)
            && self.from.is_none_or(|from| order.created_at >= from)
            && self.to.is_none_or(|to| order.created_at < to)
            && self
                .table_id
                .as_deref()
                .is_none_or(|t| order.table_id.as_deref() == Some(t))
    }
}

/// Orders of the establishment, newest first
pub async fn list_orders(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(filter): Query<OrderFilter>,
) -> Json<Vec<Order>> {
    let mut orders: Vec<Order> = state
        .store
        .list::<Order>(&user.establishment_id)
        .into_iter()
        .filter(|o| filter.matches(o))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(orders)
}

pub async fn get_order(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(state.store.require::<Order>(&user.establishment_id, &id)?))
}

/// Take an order; every team member may do this
pub async fn create_order(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(new_order): Json<NewOrder>,
) -> Result<impl IntoResponse> {
    let served_by = user.member_id().map(str::to_string);
    let order = orders::create_order(
        &state.store,
        &user.establishment_id,
        new_order,
        served_by,
        Utc::now(),
    )?;
    record_step(&state, &user.establishment_id, TutorialStep::FirstOrder);

    let table = order
        .table_id
        .as_deref()
        .and_then(|id| state.store.get::<Table>(&user.establishment_id, id))
        .map(|t| t.name)
        .unwrap_or_else(|| "Comptoir".to_string());
    notify(
        &state,
        &user.establishment_id,
        "Nouvelle commande".to_string(),
        format!("{} - {}", table, format_fcfa(order.total)),
        BTreeMap::from([("order_id".to_string(), order.id.clone())]),
    );

    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

pub async fn update_status(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Order>> {
    let order = orders::update_status(
        &state.store,
        &user.establishment_id,
        &id,
        change.status,
        &state.config.loyalty,
        Utc::now(),
    )?;

    if order.status == OrderStatus::Sent {
        let sold: Vec<Product> = order
            .items
            .iter()
            .filter_map(|item| state.store.get::<Product>(&user.establishment_id, &item.product_id))
            .collect();
        let low = low_stock(&sold);
        if !low.is_empty() {
            let names: Vec<&str> = low.iter().map(|p| p.name.as_str()).collect();
            notify(
                &state,
                &user.establishment_id,
                "Stock bas".to_string(),
                names.join(", "),
                BTreeMap::from([("order_id".to_string(), order.id.clone())]),
            );
        }
    }
    Ok(Json(order))
}

/// Printable receipt
pub async fn receipt(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Html<String>> {
    let profile = profile_of(&state, &user)?;
    let order = state.store.require::<Order>(&user.establishment_id, &id)?;
    let table = order
        .table_id
        .as_deref()
        .and_then(|t| state.store.get::<Table>(&user.establishment_id, t));
    let served_by = match order.served_by.as_deref() {
        Some(member_id) => state
            .store
            .get::<TeamMember>(&user.establishment_id, member_id)
            .map(|m| m.name),
        None => Some(profile.owner_name.clone()),
    };
    Ok(Html(receipt_html(
        &profile,
        &order,
        table.as_ref(),
        served_by.as_deref(),
    )?))
}

pub async fn list_customers(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Vec<Customer>> {
    let mut customers = state.store.list::<Customer>(&user.establishment_id);
    customers.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
    Json(customers)
}

#[derive(Debug, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
}

pub async fn create_customer(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(customer): Json<NewCustomer>,
) -> Result<impl IntoResponse> {
    let customer = loyalty::add_customer(
        &state.store,
        &user.establishment_id,
        &customer.name,
        &customer.phone,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Customer>> {
    Ok(Json(state.store.require::<Customer>(&user.establishment_id, &id)?))
}

#[derive(Debug, Deserialize)]
pub struct Redemption {
    pub points: i64,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn redeem(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(redemption): Json<Redemption>,
) -> Result<Json<Customer>> {
    let description = redemption
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "Récompense".to_string());
    Ok(Json(loyalty::redeem_for(
        &state.store,
        &user.establishment_id,
        &id,
        redemption.points,
        &description,
        Utc::now(),
    )?))
}
