//! Address lookups for the profile form

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::app::SharedState;
use crate::error::Result;
use crate::geocoding::Place;
use crate::models::GeoPoint;

const DEFAULT_SUGGESTIONS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn search(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Place>>> {
    Ok(Json(state.geocoder.forward(&query.q).await?))
}

pub async fn reverse(
    State(state): State<SharedState>,
    Query(point): Query<GeoPoint>,
) -> Result<Json<Option<Place>>> {
    Ok(Json(state.geocoder.reverse(&point).await?))
}

pub async fn autocomplete(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Place>>> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    Ok(Json(state.geocoder.autocomplete(&query.q, limit).await?))
}
