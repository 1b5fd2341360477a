//! Dashboard, exports and backups

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::attachment;
use crate::app::SharedState;
use crate::downloader::{orders_to_csv, orders_to_xlsx};
use crate::error::{NackError, Result};
use crate::graph::{GraphOptions, revenue_chart as draw_revenue};
use crate::login::CurrentUser;
use crate::models::Order;
use crate::reports::{SalesSummary, summarize};
use crate::saving::backup_to_bytes;

/// Default reporting window
const DEFAULT_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct Period {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Period {
    fn bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_DAYS));
        if from >= to {
            return Err(NackError::invalid("from must be before to"));
        }
        Ok((from, to))
    }
}

/// Orders created in the period, oldest first
fn orders_in(state: &SharedState, user: &CurrentUser, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Order> {
    let mut orders: Vec<Order> = state
        .store
        .list::<Order>(&user.establishment_id)
        .into_iter()
        .filter(|o| o.created_at >= from && o.created_at < to)
        .collect();
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    orders
}

fn export_name(from: DateTime<Utc>, to: DateTime<Utc>, extension: &str) -> String {
    format!(
        "commandes_{}_{}.{}",
        from.format("%Y%m%d"),
        to.format("%Y%m%d"),
        extension
    )
}

pub async fn summary(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(period): Query<Period>,
) -> Result<Json<SalesSummary>> {
    user.require_manager()?;
    let (from, to) = period.bounds(Utc::now())?;
    let orders = orders_in(&state, &user, from, to);
    Ok(Json(summarize(&orders, from, to)))
}

pub async fn orders_csv(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(period): Query<Period>,
) -> Result<Response> {
    user.require_manager()?;
    let (from, to) = period.bounds(Utc::now())?;
    let csv = orders_to_csv(&orders_in(&state, &user, from, to));
    Ok(attachment(
        csv.into_bytes(),
        "text/csv; charset=utf-8",
        &export_name(from, to, "csv"),
    ))
}

pub async fn orders_xlsx(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(period): Query<Period>,
) -> Result<Response> {
    user.require_manager()?;
    let (from, to) = period.bounds(Utc::now())?;
    let bytes = orders_to_xlsx(&orders_in(&state, &user, from, to))
        .map_err(|e| NackError::Internal(format!("xlsx export failed: {}", e)))?;
    Ok(attachment(
        bytes,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &export_name(from, to, "xlsx"),
    ))
}

/// Daily revenue as a PNG bar chart
pub async fn revenue_chart(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(period): Query<Period>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let (from, to) = period.bounds(Utc::now())?;
    let summary = summarize(&orders_in(&state, &user, from, to), from, to);
    let png = draw_revenue(&summary.daily, &GraphOptions::default())
        .map_err(|e| NackError::Internal(format!("chart failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Compressed copy of everything the establishment owns
pub async fn backup(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response> {
    user.require_owner()?;
    let db = state.store.snapshot().scoped(&user.establishment_id);
    let bytes = backup_to_bytes(&db)?;
    let name = format!("nack_{}.bin", Utc::now().format("%Y%m%d_%H%M"));
    Ok(attachment(bytes, "application/octet-stream", &name))
}
