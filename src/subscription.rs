use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Profile;

/// Length of the free trial granted at signup
pub const TRIAL_DAYS: i64 = 7;

/// Days bought by one month of subscription
pub const PERIOD_DAYS: i64 = 30;

/// Subscription state of an establishment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Trial,
    Active,
    Expired,
}

impl Plan {
    /// Whether the establishment may keep recording business data
    pub fn is_usable(self) -> bool {
        !matches!(self, Plan::Expired)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plan::Trial => "trial",
            Plan::Active => "active",
            Plan::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Derive the plan from the two end dates
///
/// A paid subscription that still runs wins over everything else; an
/// establishment without one is on trial while the trial lasts and expired
/// afterwards.
///
/// # Examples
/// ```
/// use chrono::{Duration, Utc};
/// use nack::subscription::{Plan, derive_plan};
///
/// let now = Utc::now();
/// assert_eq!(derive_plan(None, Some(now + Duration::days(3)), now), Plan::Active);
/// assert_eq!(derive_plan(Some(now + Duration::days(3)), None, now), Plan::Trial);
/// assert_eq!(derive_plan(Some(now), Some(now), now), Plan::Expired);
/// ```
pub fn derive_plan(
    trial_ends_at: Option<DateTime<Utc>>,
    subscription_ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Plan {
    if subscription_ends_at.is_some_and(|ends| ends > now) {
        Plan::Active
    } else if trial_ends_at.is_some_and(|ends| ends > now) {
        Plan::Trial
    } else {
        Plan::Expired
    }
}

/// Start the free trial of a freshly created establishment
pub fn start_trial(profile: &mut Profile, now: DateTime<Utc>) {
    profile.trial_ends_at = Some(now + Duration::days(TRIAL_DAYS));
    refresh_plan(profile, now);
}

/// Add `days` of subscription, counting from the current end when it is
/// still in the future and from `now` otherwise
///
/// Returns the new end date.
pub fn extend(profile: &mut Profile, days: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = match profile.subscription_ends_at {
        Some(ends) if ends > now => ends,
        _ => now,
    };
    let ends = base + Duration::days(days);
    profile.subscription_ends_at = Some(ends);
    refresh_plan(profile, now);
    ends
}

/// Re-derive the stored plan; returns `true` when it changed
pub fn refresh_plan(profile: &mut Profile, now: DateTime<Utc>) -> bool {
    let plan = derive_plan(profile.trial_ends_at, profile.subscription_ends_at, now);
    let changed = plan != profile.plan;
    profile.plan = plan;
    changed
}

/// Subscription summary shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub plan: Plan,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    /// Whole days left on the current plan, zero once expired
    pub days_remaining: i64,
}

pub fn status(profile: &Profile, now: DateTime<Utc>) -> SubscriptionStatus {
    let plan = derive_plan(profile.trial_ends_at, profile.subscription_ends_at, now);
    let ends = match plan {
        Plan::Active => profile.subscription_ends_at,
        Plan::Trial => profile.trial_ends_at,
        Plan::Expired => None,
    };
    let days_remaining = ends.map(|e| (e - now).num_days()).unwrap_or(0).max(0);

    SubscriptionStatus {
        plan,
        trial_ends_at: profile.trial_ends_at,
        subscription_ends_at: profile.subscription_ends_at,
        days_remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;

    fn profile(now: DateTime<Utc>) -> Profile {
        Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "hash", now)
    }

    #[test]
    fn active_iff_subscription_in_future() {
        let now = Utc::now();
        let future = Some(now + Duration::seconds(1));
        let past = Some(now - Duration::seconds(1));

        assert_eq!(derive_plan(None, future, now), Plan::Active);
        assert_eq!(derive_plan(past, future, now), Plan::Active);
        assert_ne!(derive_plan(future, past, now), Plan::Active);
        assert_ne!(derive_plan(None, Some(now), now), Plan::Active);
        assert_eq!(derive_plan(None, None, now), Plan::Expired);
        assert_eq!(derive_plan(past, past, now), Plan::Expired);
    }

    #[test]
    fn trial_then_expiry() {
        let now = Utc::now();
        let mut p = profile(now);
        start_trial(&mut p, now);
        assert_eq!(p.plan, Plan::Trial);
        assert_eq!(status(&p, now).days_remaining, TRIAL_DAYS);

        let later = now + Duration::days(TRIAL_DAYS) + Duration::minutes(1);
        assert!(refresh_plan(&mut p, later));
        assert_eq!(p.plan, Plan::Expired);
        assert_eq!(status(&p, later).days_remaining, 0);
        assert!(!refresh_plan(&mut p, later));
    }

    #[test]
    fn extension_stacks_on_running_subscription() {
        let now = Utc::now();
        let mut p = profile(now);

        let first = extend(&mut p, PERIOD_DAYS, now);
        assert_eq!(first, now + Duration::days(PERIOD_DAYS));
        assert_eq!(p.plan, Plan::Active);

        let second = extend(&mut p, PERIOD_DAYS, now + Duration::days(10));
        assert_eq!(second, now + Duration::days(2 * PERIOD_DAYS));
    }

    #[test]
    fn extension_after_lapse_starts_from_now() {
        let now = Utc::now();
        let mut p = profile(now);
        p.subscription_ends_at = Some(now - Duration::days(40));
        refresh_plan(&mut p, now);
        assert_eq!(p.plan, Plan::Expired);

        let ends = extend(&mut p, 5, now);
        assert_eq!(ends, now + Duration::days(5));
        assert_eq!(p.plan, Plan::Active);
    }
}
