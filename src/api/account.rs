//! Signup, login, profile, subscription and tutorial routes

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{profile_of, read_upload};
use crate::app::SharedState;
use crate::billing::{self, subscription_amount};
use crate::error::{NackError, Result};
use crate::login::{
    self, Actor, CurrentUser, Registration, SESSION_COOKIE, create_session, remove_session,
};
use crate::models::{GeoPoint, HostedImage, PaymentPurpose, Profile};
use crate::notifications;
use crate::payment::LinkRequest;
use crate::subscription::{self, SubscriptionStatus};
use crate::tutorial::{self, TutorialStep};
use crate::validation::{require_text, validate_whatsapp};

/// Profile as sent to the browser, without credentials
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub establishment_name: String,
    pub owner_name: String,
    pub email: String,
    pub whatsapp: String,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub logo: Option<HostedImage>,
    pub wallet: Option<String>,
    pub disbursement_id: Option<String>,
    pub tutorial_step: TutorialStep,
    pub subscription: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn new(profile: &Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: profile.id.clone(),
            establishment_name: profile.establishment_name.clone(),
            owner_name: profile.owner_name.clone(),
            email: profile.email.clone(),
            whatsapp: profile.whatsapp.clone(),
            address: profile.address.clone(),
            location: profile.location.clone(),
            logo: profile.logo.clone(),
            wallet: profile.wallet.clone(),
            disbursement_id: profile.disbursement_id.clone(),
            tutorial_step: profile.tutorial_step,
            subscription: subscription::status(profile, now),
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub actor: Actor,
    pub profile: ProfileView,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

fn open_session(
    state: &SharedState,
    jar: CookieJar,
    profile: &Profile,
    actor: Actor,
) -> (CookieJar, Json<AuthResponse>) {
    let token = create_session(&profile.id, actor.clone(), state.config.session_hours);
    (
        jar.add(session_cookie(&token)),
        Json(AuthResponse {
            token,
            actor,
            profile: ProfileView::new(profile, Utc::now()),
        }),
    )
}

pub async fn signup(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(registration): Json<Registration>,
) -> Result<impl IntoResponse> {
    let profile = login::register_establishment(&state.store, registration, Utc::now())?;
    let (jar, body) = open_session(&state, jar, &profile, Actor::Owner);
    Ok((StatusCode::CREATED, jar, body))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<impl IntoResponse> {
    let profile = login::authenticate(&state.store, &form.email, &form.password)?;
    info!("Owner of {} logged in", profile.id);
    Ok(open_session(&state, jar, &profile, Actor::Owner))
}

#[derive(Debug, Deserialize)]
pub struct StaffLoginForm {
    pub establishment_id: String,
    pub code: String,
}

pub async fn staff_login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<StaffLoginForm>,
) -> Result<impl IntoResponse> {
    let member = login::staff_login(&state.store, &form.establishment_id, &form.code)?;
    let profile = state
        .store
        .require::<Profile>(&form.establishment_id, &form.establishment_id)?;
    info!("{} ({:?}) opened a staff session on {}", member.name, member.role, profile.id);
    Ok(open_session(
        &state,
        jar,
        &profile,
        Actor::Staff {
            member_id: member.id,
            role: member.role,
        },
    ))
}

pub async fn logout(
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> impl IntoResponse {
    remove_session(&user.session_id);
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    (jar.remove(cookie), StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Mail a reset code; the answer is the same whether the account exists or not
pub async fn request_reset(
    State(state): State<SharedState>,
    Json(request): Json<ResetRequest>,
) -> Result<impl IntoResponse> {
    if let Some((profile, code)) =
        login::request_password_reset(&state.store, &request.email, Utc::now())?
    {
        match state.mailer.clone() {
            Some(mailer) => {
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = mailer.send_password_reset(&profile.email, &code) {
                        warn!("Could not mail the reset code of {}: {}", profile.id, e);
                    }
                });
            }
            None => warn!("Reset code requested for {} but mail is disabled", profile.id),
        }
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirm {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn confirm_reset(
    State(state): State<SharedState>,
    Json(form): Json<ResetConfirm>,
) -> Result<impl IntoResponse> {
    login::reset_password(
        &state.store,
        &form.email,
        &form.code,
        &form.new_password,
        Utc::now(),
    )?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(form): Json<PasswordChange>,
) -> Result<impl IntoResponse> {
    user.require_owner()?;
    login::change_password(
        &state.store,
        &user.establishment_id,
        &user.session_id,
        &form.old_password,
        &form.new_password,
        Utc::now(),
    )?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub actor: Actor,
    pub is_admin: bool,
    pub profile: ProfileView,
}

pub async fn me(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Me>> {
    let profile = profile_of(&state, &user)?;
    Ok(Json(Me {
        is_admin: user.is_owner() && crate::admin::is_admin(&state.store, &profile.id),
        actor: user.actor,
        profile: ProfileView::new(&profile, Utc::now()),
    }))
}

/// Editable profile fields; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub establishment_name: Option<String>,
    pub owner_name: Option<String>,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub wallet: Option<String>,
    pub disbursement_id: Option<String>,
}

fn blank_to_none(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

pub async fn update_profile(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileView>> {
    user.require_owner()?;
    let establishment_name = update
        .establishment_name
        .as_deref()
        .map(|name| require_text("establishment_name", name))
        .transpose()?;
    let owner_name = update
        .owner_name
        .as_deref()
        .map(|name| require_text("owner_name", name))
        .transpose()?;
    let whatsapp = update.whatsapp.as_deref().map(validate_whatsapp).transpose()?;

    let now = Utc::now();
    let profile = state.store.update::<Profile, _>(
        &user.establishment_id,
        &user.establishment_id,
        |profile| {
            if let Some(name) = establishment_name {
                profile.establishment_name = name;
            }
            if let Some(name) = owner_name {
                profile.owner_name = name;
            }
            if let Some(whatsapp) = whatsapp {
                profile.whatsapp = whatsapp;
            }
            if let Some(address) = update.address {
                profile.address = blank_to_none(address);
            }
            if let Some(location) = update.location {
                profile.location = Some(location);
            }
            if let Some(wallet) = update.wallet {
                profile.wallet = blank_to_none(wallet);
            }
            if let Some(disbursement_id) = update.disbursement_id {
                profile.disbursement_id = blank_to_none(disbursement_id);
            }
            profile.updated_at = now;
            Ok(())
        },
    )?;
    Ok(Json(ProfileView::new(&profile, now)))
}

pub async fn upload_logo(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Json<ProfileView>> {
    user.require_owner()?;
    let upload = read_upload(multipart).await?;
    let image = state
        .images
        .upload(upload.bytes, &upload.file_name, &upload.content_type)
        .await?;

    let previous = profile_of(&state, &user)?.logo;
    let now = Utc::now();
    let profile = state.store.update::<Profile, _>(
        &user.establishment_id,
        &user.establishment_id,
        |profile| {
            profile.logo = Some(image);
            profile.updated_at = now;
            Ok(())
        },
    )?;
    state.images.discard(previous.as_ref()).await;
    Ok(Json(ProfileView::new(&profile, now)))
}

pub async fn subscription(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SubscriptionStatus>> {
    let profile = profile_of(&state, &user)?;
    Ok(Json(subscription::status(&profile, Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub months: u32,
}

#[derive(Debug, Serialize)]
pub struct Checkout {
    pub reference: String,
    pub amount: i64,
    pub link: String,
}

/// Open a subscription payment and return the gateway link
pub async fn checkout(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Checkout>> {
    user.require_owner()?;
    let amount = subscription_amount(state.config.subscription_price, request.months)?;
    let payment = billing::open_payment(
        &state.store,
        &user.establishment_id,
        PaymentPurpose::Subscription {
            months: request.months,
        },
        amount,
        Utc::now(),
    )?;

    let base = state.config.public_url.trim_end_matches('/');
    let link_request = LinkRequest {
        reference: payment.id.clone(),
        amount,
        redirect_success: format!("{}/abonnement?paiement=succes&ref={}", base, payment.id),
        redirect_error: format!("{}/abonnement?paiement=echec&ref={}", base, payment.id),
        wallet: None,
        disbursement: None,
    };

    let link = match state.gateway.create_link(&link_request).await {
        Ok(link) => link,
        Err(e) => {
            billing::confirm_payment(&state.store, &payment.id, false, Utc::now())?;
            return Err(e);
        }
    };
    billing::attach_link(&state.store, &user.establishment_id, &payment.id, &link, Utc::now())?;

    Ok(Json(Checkout {
        reference: payment.id,
        amount,
        link,
    }))
}

#[derive(Debug, Serialize)]
pub struct TutorialState {
    pub step: TutorialStep,
    pub completed: bool,
}

impl From<TutorialStep> for TutorialState {
    fn from(step: TutorialStep) -> Self {
        Self {
            step,
            completed: step.is_completed(),
        }
    }
}

pub async fn tutorial(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<TutorialState>> {
    Ok(Json(profile_of(&state, &user)?.tutorial_step.into()))
}

#[derive(Debug, Deserialize)]
pub struct StepDone {
    pub step: TutorialStep,
}

pub async fn complete_tutorial_step(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(done): Json<StepDone>,
) -> Result<Json<TutorialState>> {
    let step = tutorial::record(&state.store, &user.establishment_id, done.step, Utc::now())?;
    Ok(Json(step.into()))
}

pub async fn skip_tutorial(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<TutorialState>> {
    user.require_owner()?;
    let step = tutorial::skip(&state.store, &user.establishment_id, Utc::now())?;
    Ok(Json(step.into()))
}

#[derive(Debug, Deserialize)]
pub struct DeviceToken {
    pub token: String,
}

pub async fn register_push_token(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(device): Json<DeviceToken>,
) -> Result<impl IntoResponse> {
    notifications::register_token(&state.store, &user.establishment_id, &device.token, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unregister_push_token(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Json(device): Json<DeviceToken>,
) -> Result<impl IntoResponse> {
    if device.token.trim().is_empty() {
        return Err(NackError::invalid("device token is empty"));
    }
    notifications::unregister_token(&state.store, &user.establishment_id, &device.token, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}
