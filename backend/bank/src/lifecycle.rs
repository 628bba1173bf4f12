//! # Coupon Lifecycle
//!
//! Pure rules: which actor may do what to a coupon, what state it lands in,
//! and how a coupon should be shown for a given month. Nothing here touches
//! storage; the caller persists the returned patch and only then applies it.
//!
//! ## Transitions
//!
//! | From | Action | To | Actor |
//! |---|---|---|---|
//! | `unlocked`, or `locked` in the current month | save | `saved` | recipient |
//! | `saved` | request redemption | `pending` | recipient |
//! | `pending` | approve | `used` | owner |
//! | any | edit | unchanged | owner |
//!
//! The actor's role is checked before the coupon's state.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    coupons::{Coupon, CouponPatch, CouponState},
    role::{Actor, Role},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Save,
    RequestRedemption,
    Approve,
    Edit,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Save,
        Action::RequestRedemption,
        Action::Approve,
        Action::Edit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Save => "save",
            Action::RequestRedemption => "request_redemption",
            Action::Approve => "approve",
            Action::Edit => "edit",
        }
    }

    /// The only role allowed to perform this action.
    pub fn required_role(&self) -> Role {
        match self {
            Action::Save | Action::RequestRedemption => Role::Recipient,
            Action::Approve | Action::Edit => Role::Owner,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("The {role} cannot {action} a coupon")]
    Forbidden { action: Action, role: Role },

    #[error("Cannot {action} a coupon that is {state}")]
    InvalidTransition { action: Action, state: CouponState },

    #[error("The coupon for month {month} is not available yet")]
    NotRevealable { month: u8 },
}

/// Target state for `action` on `coupon`, ignoring who is asking.
///
/// Returns `None` when the coupon's state does not allow it.
fn target_state(coupon: &Coupon, action: Action, current_month: u8) -> Option<CouponState> {
    use CouponState as S;

    let is_current = coupon.month_number == current_month;

    match (&coupon.state, action) {
        (S::Unlocked, Action::Save) => Some(S::Saved),
        (S::Locked, Action::Save) if is_current => Some(S::Saved),
        (S::Saved, Action::RequestRedemption) => Some(S::Pending),
        (S::Pending, Action::Approve) => Some(S::Used),
        (state, Action::Edit) => Some(state.clone()),
        _ => None,
    }
}

pub fn authorize(action: Action, role: Role) -> Result<(), LifecycleError> {
    if action.required_role() != role {
        return Err(LifecycleError::Forbidden { action, role });
    }

    Ok(())
}

/// Work out the store patch for a state transition.
///
/// `Edit` carries content and goes through [`plan_edit`] instead.
pub fn plan_transition(
    coupon: &Coupon,
    action: Action,
    actor: &Actor,
    current_month: u8,
    now: DateTime<Utc>,
) -> Result<CouponPatch, LifecycleError> {
    authorize(action, actor.role)?;

    let invalid = || LifecycleError::InvalidTransition {
        action,
        state: coupon.state.clone(),
    };

    if action == Action::Edit {
        return Err(invalid());
    }

    let next = target_state(coupon, action, current_month).ok_or_else(invalid)?;

    let mut patch = CouponPatch {
        state: Some(next),
        ..Default::default()
    };

    match action {
        Action::Save if coupon.unlock_date.is_none() => patch.unlock_date = Some(now),
        // never stamp a redemption before the coupon was unlocked
        Action::Approve => {
            patch.use_date = Some(coupon.unlock_date.map_or(now, |unlocked| unlocked.max(now)))
        }
        _ => {}
    }

    Ok(patch)
}

pub fn plan_edit(
    actor: &Actor,
    title: impl Into<String>,
    description: impl Into<String>,
) -> Result<CouponPatch, LifecycleError> {
    authorize(Action::Edit, actor.role)?;

    Ok(CouponPatch {
        title: Some(title.into()),
        description: Some(description.into()),
        ..Default::default()
    })
}

/// Whether the actor may open the coupon's detail view.
pub fn is_revealable(coupon: &Coupon, role: Role, current_month: u8) -> bool {
    matches!(
        coupon.state,
        CouponState::Unlocked | CouponState::Saved | CouponState::Pending
    ) || coupon.month_number == current_month
        || role.is_owner()
}

pub fn ensure_revealable(
    coupon: &Coupon,
    role: Role,
    current_month: u8,
) -> Result<(), LifecycleError> {
    if !is_revealable(coupon, role, current_month) {
        return Err(LifecycleError::NotRevealable {
            month: coupon.month_number,
        });
    }

    Ok(())
}

/// Actions that would currently succeed for this role.
pub fn available_actions(coupon: &Coupon, role: Role, current_month: u8) -> Vec<Action> {
    Action::ALL
        .iter()
        .copied()
        .filter(|action| action.required_role() == role)
        .filter(|action| target_state(coupon, *action, current_month).is_some())
        .collect()
}

/// Rendering flags, derived from state and month and never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub is_unlocked: bool,
    pub is_extracted: bool,
    pub is_used: bool,
    pub is_locked: bool,
}

impl Flags {
    pub fn derive(coupon: &Coupon, current_month: u8) -> Self {
        let is_unlocked =
            coupon.state == CouponState::Unlocked || coupon.month_number == current_month;
        let is_extracted = coupon.state.in_wallet();
        let is_used = coupon.state == CouponState::Used;

        Self {
            is_unlocked,
            is_extracted,
            is_used,
            is_locked: !is_unlocked && !is_extracted && !is_used,
        }
    }

    /// Single badge for the calendar tile.
    pub fn badge(&self) -> Badge {
        if self.is_unlocked {
            Badge::Unlocked
        } else if self.is_used {
            Badge::Used
        } else if self.is_extracted {
            Badge::InWallet
        } else {
            Badge::Locked
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Unlocked,
    Used,
    InWallet,
    Locked,
}

pub fn wallet<'a>(coupons: impl IntoIterator<Item = &'a Coupon>) -> Vec<&'a Coupon> {
    coupons.into_iter().filter(|c| c.state.in_wallet()).collect()
}

pub fn wallet_badge<'a>(coupons: impl IntoIterator<Item = &'a Coupon>) -> usize {
    coupons.into_iter().filter(|c| c.state.in_wallet()).count()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::seed::{seed_coupon, seed_coupons};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
    }

    fn coupon(month: u8, state: CouponState) -> Coupon {
        let mut coupon = seed_coupon(month, 1);
        coupon.state = state;
        coupon
    }

    fn owner() -> Actor {
        Actor::owner("owner")
    }

    fn recipient() -> Actor {
        Actor::recipient("recipient")
    }

    #[test]
    fn test_current_month_always_revealable() {
        for state in [
            CouponState::Locked,
            CouponState::Used,
            CouponState::Unrecognised("weird".into()),
        ] {
            let c = coupon(3, state);
            assert!(is_revealable(&c, Role::Recipient, 3));
            assert!(is_revealable(&c, Role::Owner, 3));
        }
    }

    #[test]
    fn test_reveal_rules_for_other_months() {
        assert!(!is_revealable(&coupon(7, CouponState::Locked), Role::Recipient, 3));
        assert!(!is_revealable(&coupon(1, CouponState::Used), Role::Recipient, 3));
        assert!(is_revealable(&coupon(7, CouponState::Unlocked), Role::Recipient, 3));
        assert!(is_revealable(&coupon(1, CouponState::Saved), Role::Recipient, 3));
        assert!(is_revealable(&coupon(1, CouponState::Pending), Role::Recipient, 3));
        assert!(is_revealable(&coupon(7, CouponState::Locked), Role::Owner, 3));

        assert_eq!(
            ensure_revealable(&coupon(7, CouponState::Locked), Role::Recipient, 3),
            Err(LifecycleError::NotRevealable { month: 7 })
        );
    }

    #[test]
    fn test_locked_current_month_is_unlocked_for_display() {
        let flags = Flags::derive(&coupon(3, CouponState::Locked), 3);

        assert!(flags.is_unlocked);
        assert!(!flags.is_locked);
        assert_eq!(flags.badge(), Badge::Unlocked);
    }

    #[test]
    fn test_flags_for_other_months() {
        let locked = Flags::derive(&coupon(8, CouponState::Locked), 3);
        assert!(locked.is_locked);
        assert_eq!(locked.badge(), Badge::Locked);

        let saved = Flags::derive(&coupon(1, CouponState::Saved), 3);
        assert!(saved.is_extracted && !saved.is_locked);
        assert_eq!(saved.badge(), Badge::InWallet);

        let used = Flags::derive(&coupon(1, CouponState::Used), 3);
        assert!(used.is_used && !used.is_locked);
        assert_eq!(used.badge(), Badge::Used);

        let odd = Flags::derive(&coupon(9, CouponState::Unrecognised("x".into())), 3);
        assert!(odd.is_locked);
    }

    #[test]
    fn test_recipient_saves_current_locked_coupon() {
        let c = coupon(3, CouponState::Locked);
        let patch = plan_transition(&c, Action::Save, &recipient(), 3, now()).unwrap();

        assert_eq!(patch.state, Some(CouponState::Saved));
        assert_eq!(patch.unlock_date, Some(now()));
        assert_eq!(patch.use_date, None);
    }

    #[test]
    fn test_locked_coupon_outside_current_month_cannot_be_saved() {
        let c = coupon(4, CouponState::Locked);

        assert_eq!(
            plan_transition(&c, Action::Save, &recipient(), 3, now()),
            Err(LifecycleError::InvalidTransition {
                action: Action::Save,
                state: CouponState::Locked
            })
        );
    }

    #[test]
    fn test_unlocked_coupon_keeps_existing_unlock_date() {
        let mut c = coupon(5, CouponState::Unlocked);
        c.unlock_date = Some(now() - Duration::days(3));

        let patch = plan_transition(&c, Action::Save, &recipient(), 3, now()).unwrap();
        assert_eq!(patch.state, Some(CouponState::Saved));
        assert_eq!(patch.unlock_date, None);
    }

    #[test]
    fn test_owner_never_saves_or_requests() {
        for (state, action) in [
            (CouponState::Unlocked, Action::Save),
            (CouponState::Saved, Action::RequestRedemption),
        ] {
            let c = coupon(3, state);
            assert_eq!(
                plan_transition(&c, action, &owner(), 3, now()),
                Err(LifecycleError::Forbidden {
                    action,
                    role: Role::Owner
                })
            );
        }
    }

    #[test]
    fn test_request_redemption_only_changes_state() {
        let mut c = coupon(2, CouponState::Saved);
        let before = c.clone();

        let patch = plan_transition(&c, Action::RequestRedemption, &recipient(), 3, now()).unwrap();
        c.apply(&patch);

        assert_eq!(c.state, CouponState::Pending);
        assert_eq!(c.title, before.title);
        assert_eq!(c.description, before.description);
        assert_eq!(c.use_date, None);
    }

    #[test]
    fn test_recipient_cannot_approve() {
        let c = coupon(2, CouponState::Pending);

        assert_eq!(
            plan_transition(&c, Action::Approve, &recipient(), 3, now()),
            Err(LifecycleError::Forbidden {
                action: Action::Approve,
                role: Role::Recipient
            })
        );
    }

    #[test]
    fn test_recipient_cannot_skip_pending() {
        let c = coupon(2, CouponState::Saved);

        assert!(plan_transition(&c, Action::Approve, &recipient(), 3, now()).is_err());
        assert!(plan_transition(&c, Action::Approve, &owner(), 3, now()).is_err());
    }

    #[test]
    fn test_approve_stamps_use_date_after_unlock() {
        let mut c = coupon(2, CouponState::Pending);
        c.unlock_date = Some(now() - Duration::days(10));

        let patch = plan_transition(&c, Action::Approve, &owner(), 3, now()).unwrap();
        c.apply(&patch);

        assert_eq!(c.state, CouponState::Used);
        assert_eq!(c.use_date, Some(now()));
        assert!(c.use_date >= c.unlock_date);

        let flags = Flags::derive(&c, 3);
        assert!(!flags.is_locked && !flags.is_extracted);
        assert!(wallet([&c]).is_empty());
    }

    #[test]
    fn test_approve_never_precedes_unlock() {
        let mut c = coupon(2, CouponState::Pending);
        let future = now() + Duration::hours(2);
        c.unlock_date = Some(future);

        let patch = plan_transition(&c, Action::Approve, &owner(), 3, now()).unwrap();
        assert_eq!(patch.use_date, Some(future));
    }

    #[test]
    fn test_used_is_terminal() {
        let c = coupon(1, CouponState::Used);

        for actor in [owner(), recipient()] {
            for action in [Action::Save, Action::RequestRedemption, Action::Approve] {
                assert!(plan_transition(&c, action, &actor, 1, now()).is_err());
            }
        }
    }

    #[test]
    fn test_edit_is_owner_only() {
        assert_eq!(
            plan_edit(&recipient(), "t", "d"),
            Err(LifecycleError::Forbidden {
                action: Action::Edit,
                role: Role::Recipient
            })
        );

        let patch = plan_edit(&owner(), "New title", "New description").unwrap();
        assert_eq!(patch.state, None);
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.description.as_deref(), Some("New description"));
    }

    #[test]
    fn test_available_actions() {
        let saved = coupon(2, CouponState::Saved);
        assert_eq!(
            available_actions(&saved, Role::Recipient, 3),
            vec![Action::RequestRedemption]
        );
        assert_eq!(available_actions(&saved, Role::Owner, 3), vec![Action::Edit]);

        let pending = coupon(2, CouponState::Pending);
        assert!(available_actions(&pending, Role::Recipient, 3).is_empty());
        assert_eq!(
            available_actions(&pending, Role::Owner, 3),
            vec![Action::Approve, Action::Edit]
        );

        let current = coupon(3, CouponState::Locked);
        assert_eq!(available_actions(&current, Role::Recipient, 3), vec![Action::Save]);
    }

    #[test]
    fn test_wallet_badge_tracks_transitions() {
        let mut coupons = seed_coupons(3);
        assert_eq!(wallet_badge(&coupons), 0);

        let steps = [
            (Action::Save, recipient()),
            (Action::RequestRedemption, recipient()),
            (Action::Approve, owner()),
        ];
        let expected = [1, 1, 0];

        for ((action, actor), badge) in steps.iter().zip(expected) {
            let patch = plan_transition(&coupons[2], *action, actor, 3, now()).unwrap();
            coupons[2].apply(&patch);

            assert_eq!(wallet_badge(&coupons), badge);
            assert_eq!(wallet(&coupons).len(), badge);
        }
    }
}
