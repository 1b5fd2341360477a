//! Operator tooling shared by the admin HTTP routes and `nack-admin`

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::error::{NackError, Result};
use crate::models::{Admin, Order, OrderStatus, Product, Profile};
use crate::store::{Store, Transaction};
use crate::subscription::{self, Plan, SubscriptionStatus};
use crate::validation::{normalize_phone, validate_email};

/// Find an establishment by id or owner email
pub fn find_profile(store: &Store, key: &str) -> Result<Profile> {
    if let Some(profile) = store.find::<Profile>(key) {
        return Ok(profile);
    }
    let email = key.trim().to_lowercase();
    store
        .all::<Profile>()
        .into_iter()
        .find(|p| p.email == email)
        .ok_or(NackError::NotFound("Profile"))
}

/// Grant `days` of subscription to an establishment
pub fn extend_subscription(
    store: &Store,
    key: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<SubscriptionStatus> {
    if days <= 0 {
        return Err(NackError::invalid("days must be positive"));
    }
    let profile = find_profile(store, key)?;
    let profile = store.update::<Profile, _>(&profile.id, &profile.id, |profile| {
        subscription::extend(profile, days, now);
        profile.updated_at = now;
        Ok(())
    })?;
    info!(
        "Extended {} ({}) by {} days, now {}",
        profile.establishment_name, profile.id, days, profile.plan
    );
    Ok(subscription::status(&profile, now))
}

/// Give platform administration rights to the account owning `email`
pub fn promote_admin(
    store: &Store,
    email: &str,
    promoted_by: &str,
    now: DateTime<Utc>,
) -> Result<Admin> {
    let email = validate_email(email)?;
    let profile = store
        .all::<Profile>()
        .into_iter()
        .find(|p| p.email == email)
        .ok_or(NackError::NotFound("Profile"))?;

    if let Some(existing) = store.find::<Admin>(&profile.id) {
        return Ok(existing);
    }

    let admin = store.put(Admin {
        id: profile.id,
        email,
        promoted_at: now,
        promoted_by: promoted_by.to_string(),
    })?;
    info!("{} is now an administrator", admin.email);
    Ok(admin)
}

pub fn is_admin(store: &Store, profile_id: &str) -> bool {
    store.find::<Admin>(profile_id).is_some()
}

/// What a backfill pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub profiles_scanned: usize,
    pub trials_started: usize,
    pub phones_normalized: usize,
    pub plans_updated: usize,
    pub stock_clamped: usize,
}

/// Bring documents written by older versions up to date
///
/// Profiles without a trial get one counted from their creation date,
/// phone numbers lose their spacing, stored plans are re-derived and
/// negative stock is reset to zero. With `dry_run` nothing is written.
pub fn backfill(store: &Store, dry_run: bool, now: DateTime<Utc>) -> Result<BackfillReport> {
    let run = |tx: &mut Transaction<'_>| -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut profiles: Vec<Profile> = tx.all::<Profile>().into_iter().cloned().collect();
        report.profiles_scanned = profiles.len();

        for profile in profiles.iter_mut() {
            let mut touched = false;

            if profile.trial_ends_at.is_none() {
                subscription::start_trial(profile, profile.created_at);
                report.trials_started += 1;
                touched = true;
            }

            let phone = normalize_phone(&profile.whatsapp);
            if phone != profile.whatsapp {
                profile.whatsapp = phone;
                report.phones_normalized += 1;
                touched = true;
            }

            if subscription::refresh_plan(profile, now) {
                report.plans_updated += 1;
                touched = true;
            }

            if touched {
                profile.updated_at = now;
                tx.put(profile.clone());
            }

            let negative: Vec<Product> = tx
                .list::<Product>(&profile.id)
                .into_iter()
                .filter(|p| p.quantity < 0)
                .cloned()
                .collect();
            for mut product in negative {
                product.quantity = 0;
                product.updated_at = now;
                tx.put(product);
                report.stock_clamped += 1;
            }
        }
        Ok(report)
    };

    let report = if dry_run {
        store.preview(run)?
    } else {
        store.transaction(run)?
    };

    info!("Backfill{}: {:?}", if dry_run { " (dry run)" } else { "" }, report);
    Ok(report)
}

/// Store the expired plan on every establishment whose time ran out
///
/// Returns the ids that changed.
pub fn expire_plans(store: &Store, now: DateTime<Utc>) -> Result<Vec<String>> {
    let expired = store.transaction(|tx| {
        let mut expired = Vec::new();
        let profiles: Vec<Profile> = tx.all::<Profile>().into_iter().cloned().collect();
        for mut profile in profiles {
            if subscription::refresh_plan(&mut profile, now) && profile.plan == Plan::Expired {
                profile.updated_at = now;
                expired.push(profile.id.clone());
                tx.put(profile);
            }
        }
        Ok(expired)
    })?;

    if !expired.is_empty() {
        info!("{} establishment(s) expired", expired.len());
    }
    Ok(expired)
}

/// One line of the operator's establishment list
#[derive(Debug, Clone, Serialize)]
pub struct EstablishmentSummary {
    pub id: String,
    pub establishment_name: String,
    pub email: String,
    pub whatsapp: String,
    pub plan: Plan,
    pub days_remaining: i64,
    pub products: usize,
    pub team: usize,
    pub orders_sent: usize,
    pub revenue: i64,
    pub created_at: DateTime<Utc>,
}

pub fn list_establishments(store: &Store, now: DateTime<Utc>) -> Vec<EstablishmentSummary> {
    let db = store.snapshot();
    let mut list: Vec<EstablishmentSummary> = db
        .profiles
        .values()
        .map(|profile| {
            let status = subscription::status(profile, now);
            let sent: Vec<&Order> = db
                .bar_orders
                .values()
                .filter(|o| o.establishment_id == profile.id && o.status == OrderStatus::Sent)
                .collect();
            EstablishmentSummary {
                id: profile.id.clone(),
                establishment_name: profile.establishment_name.clone(),
                email: profile.email.clone(),
                whatsapp: profile.whatsapp.clone(),
                plan: status.plan,
                days_remaining: status.days_remaining,
                products: db
                    .products
                    .values()
                    .filter(|p| p.establishment_id == profile.id)
                    .count(),
                team: db
                    .team
                    .values()
                    .filter(|m| m.establishment_id == profile.id)
                    .count(),
                orders_sent: sent.len(),
                revenue: sent.iter().map(|o| o.total).sum(),
                created_at: profile.created_at,
            }
        })
        .collect();
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    list
}
