#![cfg(feature = "web")]
//! Request handlers, grouped by area
//!
//! Handlers stay thin: they check who is calling, hand the work to the
//! domain modules and turn the result into JSON, HTML or a file download.

pub mod account;
pub mod admin;
pub mod catalogue;
pub mod events;
pub mod places;
pub mod public;
pub mod reports;
pub mod sales;
pub mod team;

use axum::{
    extract::Multipart,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use log::warn;
use std::collections::BTreeMap;

use crate::app::SharedState;
use crate::error::{NackError, Result};
use crate::login::CurrentUser;
use crate::models::Profile;
use crate::tutorial::{self, TutorialStep};

/// Profile of the caller's establishment
pub(crate) fn profile_of(state: &SharedState, user: &CurrentUser) -> Result<Profile> {
    state
        .store
        .require::<Profile>(&user.establishment_id, &user.establishment_id)
}

/// Uploaded image read from the `file` field of a multipart form
pub(crate) struct Upload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NackError::invalid(format!("bad multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| NackError::invalid(format!("cannot read upload: {}", e)))?
            .to_vec();
        return Ok(Upload {
            bytes,
            file_name,
            content_type,
        });
    }
    Err(NackError::invalid("no file field in the upload"))
}

/// Binary download with a file name
pub(crate) fn attachment(bytes: Vec<u8>, content_type: &'static str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Advance the onboarding tutorial; a failure never fails the request
pub(crate) fn record_step(state: &SharedState, establishment_id: &str, step: TutorialStep) {
    if let Err(e) = tutorial::record(&state.store, establishment_id, step, Utc::now()) {
        warn!("Could not record tutorial step for {}: {}", establishment_id, e);
    }
}

/// Push a notification to the establishment's devices in the background
pub(crate) fn notify(
    state: &SharedState,
    establishment_id: &str,
    title: String,
    body: String,
    data: BTreeMap<String, String>,
) {
    if !state.push.is_configured() {
        return;
    }
    let state = state.clone();
    let establishment_id = establishment_id.to_string();
    tokio::spawn(async move {
        state
            .push
            .notify_establishment(&state.store, &establishment_id, &title, &body, data)
            .await;
    });
}
