use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Profile;
use crate::store::Store;

/// Onboarding steps, in the order the dashboard walks through them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorialStep {
    #[default]
    Welcome,
    CreateProduct,
    CreateTable,
    FirstOrder,
    InviteTeam,
    Completed,
}

impl TutorialStep {
    pub const ALL: [TutorialStep; 6] = [
        TutorialStep::Welcome,
        TutorialStep::CreateProduct,
        TutorialStep::CreateTable,
        TutorialStep::FirstOrder,
        TutorialStep::InviteTeam,
        TutorialStep::Completed,
    ];

    pub fn next(self) -> Self {
        match self {
            TutorialStep::Welcome => TutorialStep::CreateProduct,
            TutorialStep::CreateProduct => TutorialStep::CreateTable,
            TutorialStep::CreateTable => TutorialStep::FirstOrder,
            TutorialStep::FirstOrder => TutorialStep::InviteTeam,
            TutorialStep::InviteTeam | TutorialStep::Completed => TutorialStep::Completed,
        }
    }

    pub fn is_completed(self) -> bool {
        self == TutorialStep::Completed
    }

    /// Position in the sequence, starting at 0
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// Step reached after `done` has been completed from `current`
///
/// Only the current step can be completed; anything else leaves the
/// progression where it is.
pub fn complete_step(current: TutorialStep, done: TutorialStep) -> TutorialStep {
    if done == current {
        current.next()
    } else {
        current
    }
}

/// Record that the establishment completed `done`
///
/// Called by the handlers whose action matches a tutorial step, and by the
/// dashboard's "next" button. Returns the resulting step.
pub fn record(
    store: &Store,
    establishment_id: &str,
    done: TutorialStep,
    now: DateTime<Utc>,
) -> Result<TutorialStep> {
    let current = store
        .get::<Profile>(establishment_id, establishment_id)
        .map(|p| p.tutorial_step);

    // Most writes happen long after onboarding; skip the profile rewrite then
    if current.is_some_and(|step| complete_step(step, done) == step) {
        return Ok(current.unwrap_or_default());
    }

    let profile = store.update::<Profile, _>(establishment_id, establishment_id, |profile| {
        profile.tutorial_step = complete_step(profile.tutorial_step, done);
        profile.updated_at = now;
        Ok(())
    })?;
    Ok(profile.tutorial_step)
}

pub fn skip(store: &Store, establishment_id: &str, now: DateTime<Utc>) -> Result<TutorialStep> {
    let profile = store.update::<Profile, _>(establishment_id, establishment_id, |profile| {
        profile.tutorial_step = TutorialStep::Completed;
        profile.updated_at = now;
        Ok(())
    })?;
    Ok(profile.tutorial_step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_progress_linearly() {
        let mut step = TutorialStep::Welcome;
        for expected in &TutorialStep::ALL[1..] {
            step = complete_step(step, step);
            assert_eq!(step, *expected);
        }
        assert!(step.is_completed());
        assert_eq!(complete_step(step, step), TutorialStep::Completed);
    }

    #[test]
    fn out_of_order_completion_is_ignored() {
        let step = TutorialStep::CreateProduct;
        assert_eq!(complete_step(step, TutorialStep::FirstOrder), step);
        assert_eq!(complete_step(step, TutorialStep::Welcome), step);
        assert_eq!(TutorialStep::FirstOrder.index(), 3);
    }

    #[test]
    fn record_and_skip_update_the_profile() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = crate::models::Profile::new("Bar", "Owner", "o@bar.ga", "+24106000000", "h", now);
        let id = profile.id.clone();
        store.put(profile).unwrap();

        assert_eq!(record(&store, &id, TutorialStep::CreateTable, now).unwrap(), TutorialStep::Welcome);
        assert_eq!(record(&store, &id, TutorialStep::Welcome, now).unwrap(), TutorialStep::CreateProduct);
        assert_eq!(skip(&store, &id, now).unwrap(), TutorialStep::Completed);
        assert_eq!(
            store.get::<Profile>(&id, &id).unwrap().tutorial_step,
            TutorialStep::Completed
        );
    }
}
