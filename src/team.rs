use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;

use crate::error::{NackError, Result};
use crate::models::{MemberStatus, TeamMember, TeamRole, new_id};
use crate::store::{Store, Transaction};
use crate::validation::{require_text, validate_whatsapp};

/// Digits in a staff access code
pub const ACCESS_CODE_LEN: usize = 6;

/// Random six-digit code, leading zeros allowed
pub fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn unique_code(tx: &Transaction<'_>, establishment_id: &str) -> String {
    let taken: Vec<&str> = tx
        .list::<TeamMember>(establishment_id)
        .into_iter()
        .map(|m| m.access_code.as_str())
        .collect();
    loop {
        let code = generate_access_code();
        if !taken.contains(&code.as_str()) {
            return code;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub role: TeamRole,
    #[serde(default)]
    pub phone: Option<String>,
}

pub fn add_member(
    store: &Store,
    establishment_id: &str,
    new_member: NewMember,
    now: DateTime<Utc>,
) -> Result<TeamMember> {
    let name = require_text("name", &new_member.name)?;
    let phone = new_member
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(validate_whatsapp)
        .transpose()?;

    store.transaction(|tx| {
        let member = TeamMember {
            id: new_id(),
            establishment_id: establishment_id.to_string(),
            name,
            role: new_member.role,
            status: MemberStatus::Active,
            access_code: unique_code(tx, establishment_id),
            phone,
            created_at: now,
        };
        tx.put(member.clone());
        Ok(member)
    })
}

pub fn set_status(
    store: &Store,
    establishment_id: &str,
    member_id: &str,
    status: MemberStatus,
) -> Result<TeamMember> {
    store.update::<TeamMember, _>(establishment_id, member_id, |member| {
        member.status = status;
        Ok(())
    })
}

pub fn set_role(
    store: &Store,
    establishment_id: &str,
    member_id: &str,
    role: TeamRole,
) -> Result<TeamMember> {
    store.update::<TeamMember, _>(establishment_id, member_id, |member| {
        member.role = role;
        Ok(())
    })
}

/// Issue a new access code, invalidating the previous one
pub fn regenerate_code(
    store: &Store,
    establishment_id: &str,
    member_id: &str,
) -> Result<TeamMember> {
    store.transaction(|tx| {
        let mut member = tx.require::<TeamMember>(establishment_id, member_id)?.clone();
        member.access_code = unique_code(tx, establishment_id);
        tx.put(member.clone());
        Ok(member)
    })
}

/// Active member owning `code`; suspended members cannot log in
pub fn find_by_code(store: &Store, establishment_id: &str, code: &str) -> Result<TeamMember> {
    let code = code.trim();
    if code.len() != ACCESS_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(NackError::InvalidCredentials);
    }
    store
        .list::<TeamMember>(establishment_id)
        .into_iter()
        .find(|m| m.access_code == code && m.status == MemberStatus::Active)
        .ok_or(NackError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiter(store: &Store, name: &str) -> TeamMember {
        add_member(
            store,
            "bar",
            NewMember {
                name: name.to_string(),
                role: TeamRole::Waiter,
                phone: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_access_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_are_unique_within_the_establishment() {
        let store = Store::in_memory();
        let members: Vec<TeamMember> = (0..50).map(|i| waiter(&store, &format!("W{}", i))).collect();
        let mut codes: Vec<&str> = members.iter().map(|m| m.access_code.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 50);
    }

    #[test]
    fn suspended_members_cannot_log_in() {
        let store = Store::in_memory();
        let m = waiter(&store, "Aline");

        assert_eq!(find_by_code(&store, "bar", &m.access_code).unwrap().id, m.id);
        assert!(find_by_code(&store, "other", &m.access_code).is_err());

        set_status(&store, "bar", &m.id, MemberStatus::Suspended).unwrap();
        assert!(matches!(
            find_by_code(&store, "bar", &m.access_code),
            Err(NackError::InvalidCredentials)
        ));
    }

    #[test]
    fn regenerated_code_replaces_the_old_one() {
        let store = Store::in_memory();
        let m = waiter(&store, "Aline");
        let old = m.access_code.clone();
        let renewed = regenerate_code(&store, "bar", &m.id).unwrap();
        assert_ne!(renewed.access_code, old);
        assert!(find_by_code(&store, "bar", &old).is_err());
        assert!(find_by_code(&store, "bar", &renewed.access_code).is_ok());
    }

    #[test]
    fn rejects_bad_input() {
        let store = Store::in_memory();
        let bad = NewMember {
            name: "Aline".to_string(),
            role: TeamRole::Cashier,
            phone: Some("12345".to_string()),
        };
        assert!(add_member(&store, "bar", bad, Utc::now()).is_err());
        assert!(find_by_code(&store, "bar", "12ab56").is_err());
    }
}
