//! Team members and their access codes

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use super::record_step;
use crate::app::SharedState;
use crate::error::Result;
use crate::login::{self, CurrentUser};
use crate::models::{MemberStatus, TeamMember, TeamRole};
use crate::team::{self, NewMember};
use crate::tutorial::TutorialStep;

pub async fn list(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<TeamMember>>> {
    user.require_manager()?;
    let mut members = state.store.list::<TeamMember>(&user.establishment_id);
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(members))
}

pub async fn add(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(new_member): Json<NewMember>,
) -> Result<impl IntoResponse> {
    user.require_manager()?;
    let member = team::add_member(&state.store, &user.establishment_id, new_member, Utc::now())?;
    record_step(&state, &user.establishment_id, TutorialStep::InviteTeam);
    Ok((StatusCode::CREATED, Json(member)))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: MemberStatus,
}

pub async fn set_status(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<TeamMember>> {
    user.require_manager()?;
    let member = team::set_status(&state.store, &user.establishment_id, &id, change.status)?;
    if member.status != MemberStatus::Active {
        login::remove_member_sessions(&member.id);
    }
    Ok(Json(member))
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: TeamRole,
}

/// Only the owner hands out roles
pub async fn set_role(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(change): Json<RoleChange>,
) -> Result<Json<TeamMember>> {
    user.require_owner()?;
    let member = team::set_role(&state.store, &user.establishment_id, &id, change.role)?;
    login::remove_member_sessions(&member.id);
    Ok(Json(member))
}

pub async fn regenerate_code(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<TeamMember>> {
    user.require_manager()?;
    let member = team::regenerate_code(&state.store, &user.establishment_id, &id)?;
    login::remove_member_sessions(&member.id);
    Ok(Json(member))
}
