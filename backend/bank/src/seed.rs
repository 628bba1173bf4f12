//! # Seed Bank
//!
//! Deterministic content for all twelve months. Used once to populate an empty
//! store, and as the in-memory fallback whenever the store has nothing to give
//! so the calendar is never blank.
//!
//! Relative to the current month:
//! - earlier months start `used`
//! - the current month starts `unlocked`
//! - later months start `locked`
use crate::coupons::{Coupon, CouponState, LAST_MONTH, MONTH_NAMES};

pub const SEED_ICON: &str = "gem";

pub const GEM_COLORS: [&str; 12] = [
    "cyan", "rose", "teal", "emerald", "amber", "indigo", "orange", "violet", "pink", "purple",
    "gold", "red",
];

const TITLES: [&str; 12] = [
    "Voucher for an endless hug",
    "Voucher for a surprise date",
    "Voucher for a spa day at home",
    "Voucher for an adventure together",
    "Voucher for one wish granted",
    "Voucher for a picnic under the stars",
    "Voucher for a day without complaints",
    "Voucher for a serenade",
    "Voucher for a foot massage",
    "Voucher for a movie night",
    "Voucher for breakfast in bed",
    "Voucher for a magical weekend",
];

const DESCRIPTIONS: [&str; 12] = [
    "A hug that lasts as long as you need",
    "I'll take you somewhere special without telling you where",
    "Massages, calm music and lots of affection",
    "A day to explore something new together",
    "Ask me for anything and I'll do everything I can",
    "A magical night with your favourite food",
    "24 hours where everything I say is yes",
    "I'll sing you your favourite song",
    "Total relaxation for your tired feet",
    "A marathon of your favourite films with popcorn",
    "Wake up to your favourite meal made with love",
    "Two days full of surprises and special moments",
];

pub const FALLBACK_TITLE: &str = "Surprise voucher";
pub const FALLBACK_DESCRIPTION: &str = "A gift made with love";

pub fn seed_id(month: u8) -> String {
    format!("coupon-{month}")
}

pub fn seed_state(month: u8, current_month: u8) -> CouponState {
    match month.cmp(&current_month) {
        std::cmp::Ordering::Less => CouponState::Used,
        std::cmp::Ordering::Equal => CouponState::Unlocked,
        std::cmp::Ordering::Greater => CouponState::Locked,
    }
}

pub fn seed_coupon(month: u8, current_month: u8) -> Coupon {
    let index = (month as usize).saturating_sub(1);

    Coupon {
        id: seed_id(month),
        month_number: month,
        month_name: MONTH_NAMES.get(index).copied().unwrap_or_default().to_string(),
        title: TITLES.get(index).copied().unwrap_or(FALLBACK_TITLE).to_string(),
        description: DESCRIPTIONS
            .get(index)
            .copied()
            .unwrap_or(FALLBACK_DESCRIPTION)
            .to_string(),
        state: seed_state(month, current_month),
        unlock_date: None,
        use_date: None,
        icon: SEED_ICON.to_string(),
        gem_color: GEM_COLORS.get(index).copied().unwrap_or_default().to_string(),
    }
}

pub fn seed_coupons(current_month: u8) -> Vec<Coupon> {
    (1..=LAST_MONTH)
        .map(|month| seed_coupon(month, current_month))
        .collect()
}
