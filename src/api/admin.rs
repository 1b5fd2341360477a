//! Platform operator routes

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::profile_of;
use crate::admin::{self, BackfillReport, EstablishmentSummary};
use crate::app::SharedState;
use crate::error::Result;
use crate::login::CurrentUser;
use crate::models::Admin;
use crate::subscription::SubscriptionStatus;

pub async fn list_establishments(State(state): State<SharedState>) -> Json<Vec<EstablishmentSummary>> {
    Json(admin::list_establishments(&state.store, Utc::now()))
}

#[derive(Debug, Deserialize)]
pub struct DaysGrant {
    pub days: i64,
}

/// `key` is an establishment id or the owner's email
pub async fn extend_subscription(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(grant): Json<DaysGrant>,
) -> Result<Json<SubscriptionStatus>> {
    Ok(Json(admin::extend_subscription(
        &state.store,
        &key,
        grant.days,
        Utc::now(),
    )?))
}

#[derive(Debug, Deserialize)]
pub struct Promotion {
    pub email: String,
}

pub async fn promote(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(promotion): Json<Promotion>,
) -> Result<Json<Admin>> {
    let caller = profile_of(&state, &user)?;
    Ok(Json(admin::promote_admin(
        &state.store,
        &promotion.email,
        &caller.email,
        Utc::now(),
    )?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BackfillRequest {
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn backfill(
    State(state): State<SharedState>,
    Json(request): Json<BackfillRequest>,
) -> Result<Json<BackfillReport>> {
    Ok(Json(admin::backfill(&state.store, request.dry_run, Utc::now())?))
}

#[derive(Debug, Serialize)]
pub struct Expired {
    pub expired: Vec<String>,
}

pub async fn expire_plans(State(state): State<SharedState>) -> Result<Json<Expired>> {
    Ok(Json(Expired {
        expired: admin::expire_plans(&state.store, Utc::now())?,
    }))
}
