#![cfg(feature = "web")]
//! Accounts, sessions and password recovery

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::error::{NackError, Result};
use crate::mailer::generate_reset_code;
use crate::models::{Profile, TeamMember, TeamRole};
use crate::store::Store;
use crate::subscription::start_trial;
use crate::team;
use crate::validation::{require_text, validate_email, validate_password, validate_whatsapp};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// How long a password reset code stays valid
const RESET_CODE_MINUTES: i64 = 60;

/// Longest session lifetime accepted, one year
const MAX_SESSION_HOURS: u64 = 24 * 366;

/// Who is behind a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Actor {
    Owner,
    Staff { member_id: String, role: TeamRole },
}

/// Authenticated user session
#[derive(Debug, Clone)]
pub struct Session {
    pub establishment_id: String,
    pub actor: Actor,
    pub expires_at: DateTime<Utc>,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Open a session and return its id
pub fn create_session(establishment_id: &str, actor: Actor, hours: u64) -> String {
    let session_id = Uuid::new_v4().to_string();
    let hours = i64::try_from(hours.min(MAX_SESSION_HOURS)).unwrap_or_default();
    let session = Session {
        establishment_id: establishment_id.to_string(),
        actor,
        expires_at: Utc::now() + Duration::hours(hours),
    };

    let mut sessions = SESSIONS.write().unwrap_or_else(PoisonError::into_inner);
    let now = Utc::now();
    sessions.retain(|_, s| s.expires_at > now);
    sessions.insert(session_id.clone(), session);

    session_id
}

/// The live session behind `session_id`, if any
pub fn validate_session(session_id: &str) -> Option<Session> {
    let sessions = SESSIONS.read().unwrap_or_else(PoisonError::into_inner);
    sessions
        .get(session_id)
        .filter(|session| session.expires_at > Utc::now())
        .cloned()
}

pub fn remove_session(session_id: &str) {
    SESSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(session_id);
}

/// Close every session of an establishment, e.g. after a password reset
pub fn remove_establishment_sessions(establishment_id: &str) {
    remove_other_sessions(establishment_id, "");
}

/// Close every session of an establishment except `keep`
pub fn remove_other_sessions(establishment_id: &str, keep: &str) {
    SESSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|id, s| s.establishment_id != establishment_id || id == keep);
}

/// Close the sessions opened with a team member's access code
pub fn remove_member_sessions(member_id: &str) {
    SESSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|_, s| {
            !matches!(&s.actor, Actor::Staff { member_id: id, .. } if id == member_id)
        });
}

/// Hash a password using Argon2
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String>` - The PHC-formatted hash
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| NackError::Internal("password hashing failed".to_string()))
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Result<bool>` - True if the password matches; an error when the stored
///   hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| NackError::Internal("invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Signup form
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub establishment_name: String,
    pub owner_name: String,
    pub email: String,
    pub whatsapp: String,
    pub password: String,
}

/// Create an establishment account and start its free trial
///
/// # Errors
/// * `Validation` when a field is empty or malformed
/// * `Conflict` when the email is already registered
pub fn register_establishment(
    store: &Store,
    registration: Registration,
    now: DateTime<Utc>,
) -> Result<Profile> {
    let establishment_name = require_text("establishment_name", &registration.establishment_name)?;
    let owner_name = require_text("owner_name", &registration.owner_name)?;
    let email = validate_email(&registration.email)?;
    let whatsapp = validate_whatsapp(&registration.whatsapp)?;
    validate_password(&registration.password)?;

    let password_hash = hash_password(&registration.password)?;

    let profile = store.transaction(|tx| {
        if tx.all::<Profile>().iter().any(|p| p.email == email) {
            return Err(NackError::Conflict(
                "this email address is already registered".to_string(),
            ));
        }

        let mut profile = Profile::new(
            &establishment_name,
            &owner_name,
            &email,
            &whatsapp,
            &password_hash,
            now,
        );
        start_trial(&mut profile, now);
        tx.put(profile.clone());
        Ok(profile)
    })?;

    info!("Registered establishment {} ({})", profile.establishment_name, profile.id);
    Ok(profile)
}

fn profile_by_email(store: &Store, email: &str) -> Option<Profile> {
    let email = email.trim().to_lowercase();
    store.all::<Profile>().into_iter().find(|p| p.email == email)
}

/// Owner login by email and password
pub fn authenticate(store: &Store, email: &str, password: &str) -> Result<Profile> {
    let profile = profile_by_email(store, email).ok_or(NackError::InvalidCredentials)?;
    if verify_password(password, &profile.password_hash)? {
        Ok(profile)
    } else {
        Err(NackError::InvalidCredentials)
    }
}

/// Staff login with the establishment id and a member's access code
pub fn staff_login(store: &Store, establishment_id: &str, code: &str) -> Result<TeamMember> {
    if store.get::<Profile>(establishment_id, establishment_id).is_none() {
        return Err(NackError::InvalidCredentials);
    }
    team::find_by_code(store, establishment_id, code)
}

/// Store a fresh reset code for `email`
///
/// Returns `None` for an unknown address so callers answer the same way
/// whether or not the account exists.
pub fn request_password_reset(
    store: &Store,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Option<(Profile, String)>> {
    let Some(profile) = profile_by_email(store, email) else {
        return Ok(None);
    };

    let code = generate_reset_code();
    let profile = store.update::<Profile, _>(&profile.id, &profile.id, |profile| {
        profile.reset_code = Some(code.clone());
        profile.reset_code_expires = Some(now + Duration::minutes(RESET_CODE_MINUTES));
        profile.updated_at = now;
        Ok(())
    })?;
    Ok(Some((profile, code)))
}

/// Set a new password with a reset code; the code is single-use
pub fn reset_password(
    store: &Store,
    email: &str,
    code: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    validate_password(new_password)?;
    let profile = profile_by_email(store, email).ok_or(NackError::InvalidCredentials)?;

    let valid = profile.reset_code.as_deref() == Some(code.trim())
        && profile.reset_code_expires.is_some_and(|expires| expires > now);
    if !valid {
        return Err(NackError::invalid("invalid or expired reset code"));
    }

    let password_hash = hash_password(new_password)?;
    store.update::<Profile, _>(&profile.id, &profile.id, |profile| {
        profile.password_hash = password_hash;
        profile.reset_code = None;
        profile.reset_code_expires = None;
        profile.updated_at = now;
        Ok(())
    })?;
    remove_establishment_sessions(&profile.id);
    Ok(())
}

/// Replace the owner password; every other session of the establishment
/// is closed, `current_session` stays open
pub fn change_password(
    store: &Store,
    establishment_id: &str,
    current_session: &str,
    old_password: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let profile = store.require::<Profile>(establishment_id, establishment_id)?;
    if !verify_password(old_password, &profile.password_hash)? {
        return Err(NackError::InvalidCredentials);
    }
    validate_password(new_password)?;

    let password_hash = hash_password(new_password)?;
    store.update::<Profile, _>(establishment_id, establishment_id, |profile| {
        profile.password_hash = password_hash;
        profile.updated_at = now;
        Ok(())
    })?;
    remove_other_sessions(establishment_id, current_session);
    Ok(())
}

/// Caller identity inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub establishment_id: String,
    pub actor: Actor,
}

impl CurrentUser {
    pub fn is_owner(&self) -> bool {
        self.actor == Actor::Owner
    }

    pub fn member_id(&self) -> Option<&str> {
        match &self.actor {
            Actor::Owner => None,
            Actor::Staff { member_id, .. } => Some(member_id),
        }
    }

    /// Owners and managers run the catalogue, team, events and reports
    pub fn require_manager(&self) -> Result<()> {
        match &self.actor {
            Actor::Owner
            | Actor::Staff {
                role: TeamRole::Manager,
                ..
            } => Ok(()),
            Actor::Staff { .. } => Err(NackError::Forbidden),
        }
    }

    pub fn require_owner(&self) -> Result<()> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(NackError::Forbidden)
        }
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Authentication middleware
///
/// Accepts the `session` cookie or an `Authorization: Bearer` header and
/// answers 401 otherwise.
pub async fn require_auth(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(&request));

    if let Some(session_id) = session_id {
        if let Some(session) = validate_session(&session_id) {
            request.extensions_mut().insert(CurrentUser {
                session_id,
                establishment_id: session.establishment_id,
                actor: session.actor,
            });
            return next.run(request).await;
        }
    }

    NackError::Unauthenticated.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::{NewMember, add_member};

    fn registration(email: &str) -> Registration {
        Registration {
            establishment_name: "Le Phare".to_string(),
            owner_name: "Joël".to_string(),
            email: email.to_string(),
            whatsapp: "+241 07 00 11 22".to_string(),
            password: "motdepasse".to_string(),
        }
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("secret123").unwrap();
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("secret123", "not-a-hash").is_err());
    }

    #[test]
    fn sessions_expire_and_close() {
        let id = create_session("bar", Actor::Owner, 1);
        let session = validate_session(&id).unwrap();
        assert_eq!(session.establishment_id, "bar");
        remove_session(&id);
        assert!(validate_session(&id).is_none());

        let expired = create_session("bar", Actor::Owner, 0);
        assert!(validate_session(&expired).is_none());
    }

    #[test]
    fn signup_starts_a_trial_and_rejects_duplicates() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = register_establishment(&store, registration("Joel@Phare.ga"), now).unwrap();
        assert_eq!(profile.email, "joel@phare.ga");
        assert_eq!(profile.whatsapp, "+24107001122");
        assert_eq!(profile.plan, crate::subscription::Plan::Trial);

        assert!(matches!(
            register_establishment(&store, registration("joel@phare.ga"), now),
            Err(NackError::Conflict(_))
        ));

        let mut short = registration("autre@phare.ga");
        short.password = "court".to_string();
        assert!(matches!(
            register_establishment(&store, short, now),
            Err(NackError::Validation(_))
        ));
    }

    #[test]
    fn login_and_password_reset() {
        let store = Store::in_memory();
        let now = Utc::now();
        register_establishment(&store, registration("joel@phare.ga"), now).unwrap();

        assert!(authenticate(&store, "joel@phare.ga", "motdepasse").is_ok());
        assert!(matches!(
            authenticate(&store, "joel@phare.ga", "nope"),
            Err(NackError::InvalidCredentials)
        ));
        assert!(authenticate(&store, "inconnu@phare.ga", "motdepasse").is_err());

        assert!(request_password_reset(&store, "inconnu@phare.ga", now)
            .unwrap()
            .is_none());
        let (_, code) = request_password_reset(&store, "joel@phare.ga", now)
            .unwrap()
            .unwrap();
        assert!(reset_password(&store, "joel@phare.ga", "WRONG123", "nouveaumdp", now).is_err());
        let late = now + Duration::minutes(RESET_CODE_MINUTES + 1);
        assert!(reset_password(&store, "joel@phare.ga", &code, "nouveaumdp", late).is_err());

        reset_password(&store, "joel@phare.ga", &code, "nouveaumdp", now).unwrap();
        assert!(authenticate(&store, "joel@phare.ga", "nouveaumdp").is_ok());
        // single use
        assert!(reset_password(&store, "joel@phare.ga", &code, "encoreunautre", now).is_err());
    }

    #[test]
    fn password_change_requires_the_old_one() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = register_establishment(&store, registration("joel@phare.ga"), now).unwrap();

        let current = create_session(&profile.id, Actor::Owner, 1);
        let other = create_session(&profile.id, Actor::Owner, 1);
        let elsewhere = create_session("autre-bar", Actor::Owner, 1);

        assert!(matches!(
            change_password(&store, &profile.id, &current, "pas-le-bon", "nouveaumdp", now),
            Err(NackError::InvalidCredentials)
        ));
        assert!(validate_session(&other).is_some());

        change_password(&store, &profile.id, &current, "motdepasse", "nouveaumdp", now).unwrap();
        assert!(authenticate(&store, "joel@phare.ga", "nouveaumdp").is_ok());
        assert!(validate_session(&current).is_some());
        assert!(validate_session(&other).is_none());
        assert!(validate_session(&elsewhere).is_some());
    }

    #[test]
    fn member_sessions_close_on_their_own() {
        let waiter = Actor::Staff {
            member_id: "aline".to_string(),
            role: TeamRole::Waiter,
        };
        let colleague = Actor::Staff {
            member_id: "paul".to_string(),
            role: TeamRole::Waiter,
        };
        let aline = create_session("bar-membres", waiter, 1);
        let paul = create_session("bar-membres", colleague, 1);
        let owner = create_session("bar-membres", Actor::Owner, 1);

        remove_member_sessions("aline");
        assert!(validate_session(&aline).is_none());
        assert!(validate_session(&paul).is_some());
        assert!(validate_session(&owner).is_some());
    }

    #[test]
    fn oversized_session_lifetimes_are_capped() {
        let id = create_session("bar-long", Actor::Owner, u64::MAX);
        let session = validate_session(&id).unwrap();
        assert!(session.expires_at <= Utc::now() + Duration::hours(MAX_SESSION_HOURS as i64));
    }

    #[test]
    fn staff_login_by_code() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = register_establishment(&store, registration("joel@phare.ga"), now).unwrap();
        let member = add_member(
            &store,
            &profile.id,
            NewMember {
                name: "Aline".to_string(),
                role: TeamRole::Waiter,
                phone: None,
            },
            now,
        )
        .unwrap();

        let found = staff_login(&store, &profile.id, &member.access_code).unwrap();
        assert_eq!(found.id, member.id);
        assert!(staff_login(&store, "unknown", &member.access_code).is_err());
    }

    #[test]
    fn role_checks() {
        let user = |actor| CurrentUser {
            session_id: "s".to_string(),
            establishment_id: "bar".to_string(),
            actor,
        };
        assert!(user(Actor::Owner).require_manager().is_ok());
        let manager = user(Actor::Staff {
            member_id: "m".to_string(),
            role: TeamRole::Manager,
        });
        assert!(manager.require_manager().is_ok());
        assert!(manager.require_owner().is_err());
        let waiter = user(Actor::Staff {
            member_id: "w".to_string(),
            role: TeamRole::Waiter,
        });
        assert!(matches!(waiter.require_manager(), Err(NackError::Forbidden)));
        assert_eq!(waiter.member_id(), Some("w"));
    }
}
