//! Products and tables

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use super::{read_upload, record_step};
use crate::app::SharedState;
use crate::error::Result;
use crate::inventory::{self, Margin, ProductInput};
use crate::login::CurrentUser;
use crate::models::{Product, Table};
use crate::orders::{self, TableInput};
use crate::tutorial::TutorialStep;

pub async fn list_products(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Vec<Product>> {
    let mut products = state.store.list::<Product>(&user.establishment_id);
    products.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    Json(products)
}

pub async fn get_product(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.store.require::<Product>(&user.establishment_id, &id)?))
}

pub async fn create_product(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let product = inventory::create_product(&state.store, &user.establishment_id, input, Utc::now())?;
    record_step(&state, &user.establishment_id, TutorialStep::CreateProduct);
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    user.require_manager()?;
    let previous = state.store.require::<Product>(&user.establishment_id, &id)?.image;
    let product =
        inventory::update_product(&state.store, &user.establishment_id, &id, input, Utc::now())?;
    if previous != product.image {
        state.images.discard(previous.as_ref()).await;
    }
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let product = state.store.delete::<Product>(&user.establishment_id, &id)?;
    state.images.discard(product.image.as_ref()).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct Restock {
    /// Units added; negative for losses and breakage
    pub delta: i64,
}

pub async fn restock(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(restock): Json<Restock>,
) -> Result<Json<Product>> {
    user.require_manager()?;
    Ok(Json(inventory::restock(
        &state.store,
        &user.establishment_id,
        &id,
        restock.delta,
        Utc::now(),
    )?))
}

pub async fn margin(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Margin>> {
    user.require_manager()?;
    let product = state.store.require::<Product>(&user.establishment_id, &id)?;
    Ok(Json(inventory::margin(&product)))
}

pub async fn low_stock(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Vec<Product>> {
    let products = state.store.list::<Product>(&user.establishment_id);
    Json(inventory::low_stock(&products))
}

pub async fn upload_image(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    user.require_manager()?;
    let previous = state.store.require::<Product>(&user.establishment_id, &id)?.image;
    let upload = read_upload(multipart).await?;
    let image = state
        .images
        .upload(upload.bytes, &upload.file_name, &upload.content_type)
        .await?;

    let now = Utc::now();
    let product = state
        .store
        .update::<Product, _>(&user.establishment_id, &id, |product| {
            product.image = Some(image);
            product.updated_at = now;
            Ok(())
        })?;
    state.images.discard(previous.as_ref()).await;
    Ok(Json(product))
}

pub async fn list_tables(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Vec<Table>> {
    let mut tables = state.store.list::<Table>(&user.establishment_id);
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    Json(tables)
}

pub async fn create_table(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<TableInput>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let table = orders::create_table(&state.store, &user.establishment_id, input, Utc::now())?;
    record_step(&state, &user.establishment_id, TutorialStep::CreateTable);
    Ok((StatusCode::CREATED, Json(table)))
}

pub async fn update_table(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(input): Json<TableInput>,
) -> Result<Json<Table>> {
    user.require_manager()?;
    Ok(Json(orders::update_table(&state.store, &user.establishment_id, &id, input)?))
}

pub async fn delete_table(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    orders::delete_table(&state.store, &user.establishment_id, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
