use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NackError, Result};
use crate::models::{Customer, RewardEntry, RewardKind, new_id};
use crate::store::Store;
use crate::validation::{require_text, validate_whatsapp};

/// How spending turns into loyalty points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyRules {
    /// FCFA to spend for one point
    pub spend_per_point: i64,
}

impl Default for LoyaltyRules {
    fn default() -> Self {
        Self {
            spend_per_point: 1_000,
        }
    }
}

impl LoyaltyRules {
    /// Points earned for one purchase; partial points are dropped
    ///
    /// # Examples
    /// ```
    /// use nack::loyalty::LoyaltyRules;
    ///
    /// let rules = LoyaltyRules { spend_per_point: 1000 };
    /// assert_eq!(rules.points_for(4_500), 4);
    /// assert_eq!(rules.points_for(999), 0);
    /// ```
    pub fn points_for(&self, amount: i64) -> i64 {
        if self.spend_per_point <= 0 || amount <= 0 {
            return 0;
        }
        amount / self.spend_per_point
    }
}

/// Credit a purchase to the customer and return the points earned
pub fn record_purchase(
    customer: &mut Customer,
    amount: i64,
    rules: &LoyaltyRules,
    description: &str,
    now: DateTime<Utc>,
) -> i64 {
    let earned = rules.points_for(amount);

    customer.total_spent += amount.max(0);
    customer.visits += 1;
    customer.last_visit_at = Some(now);
    customer.points += earned;

    if earned > 0 {
        customer.rewards.push(RewardEntry {
            at: now,
            kind: RewardKind::Earned,
            points: earned,
            description: description.to_string(),
        });
    }

    earned
}

/// Spend `points` on a reward
pub fn redeem(
    customer: &mut Customer,
    points: i64,
    description: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if points <= 0 {
        return Err(NackError::invalid("points to redeem must be positive"));
    }
    if customer.points < points {
        return Err(NackError::InsufficientPoints {
            available: customer.points,
            requested: points,
        });
    }

    customer.points -= points;
    customer.rewards.push(RewardEntry {
        at: now,
        kind: RewardKind::Redeemed,
        points,
        description: description.to_string(),
    });
    Ok(())
}

/// Register a loyalty customer; phone numbers are unique per establishment
pub fn add_customer(
    store: &Store,
    establishment_id: &str,
    name: &str,
    phone: &str,
    now: DateTime<Utc>,
) -> Result<Customer> {
    let name = require_text("name", name)?;
    let phone = validate_whatsapp(phone)?;

    store.transaction(|tx| {
        if tx
            .list::<Customer>(establishment_id)
            .iter()
            .any(|c| c.phone == phone)
        {
            return Err(NackError::Conflict(format!(
                "a customer with phone {} already exists",
                phone
            )));
        }

        let customer = Customer {
            id: new_id(),
            establishment_id: establishment_id.to_string(),
            name,
            phone,
            points: 0,
            total_spent: 0,
            visits: 0,
            last_visit_at: None,
            rewards: Vec::new(),
            created_at: now,
        };
        tx.put(customer.clone());
        Ok(customer)
    })
}

pub fn redeem_for(
    store: &Store,
    establishment_id: &str,
    customer_id: &str,
    points: i64,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Customer> {
    store.update::<Customer, _>(establishment_id, customer_id, |customer| {
        redeem(customer, points, description, now)
    })
}
