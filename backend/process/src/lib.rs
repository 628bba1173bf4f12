//! # Store Maintenance
//!
//! Operator commands run against whichever store the server is configured
//! for. Nothing here goes through the HTTP surface or the session check.
//!
//! - `seed` fills an empty store with the twelve seed coupons
//! - `status` prints one line per stored coupon
use anyhow::{Result, bail, ensure};
use bank::{
    Coupon,
    coupons::{FIRST_MONTH, LAST_MONTH, is_valid_month},
    seed::seed_coupons,
};
use server::database::CouponStore;
use tracing::info;

/// Insert the seed for `current_month`. Refuses to touch a store that already
/// holds coupons.
pub async fn seed(store: &dyn CouponStore, current_month: u8) -> Result<usize> {
    ensure!(
        is_valid_month(current_month),
        "month must be between {FIRST_MONTH} and {LAST_MONTH}, got {current_month}"
    );

    let existing = store.select_all().await?;
    if !existing.is_empty() {
        bail!(
            "store already holds {} coupons, refusing to seed",
            existing.len()
        );
    }

    let coupons = seed_coupons(current_month);
    store.insert(&coupons).await?;

    info!("Seeded {} coupons for month {current_month}", coupons.len());

    Ok(coupons.len())
}

pub async fn status(store: &dyn CouponStore, current_month: u8) -> Result<Vec<String>> {
    let mut coupons = store.select_all().await?;
    coupons.sort_by_key(|c| c.month_number);

    Ok(coupons
        .iter()
        .map(|coupon| status_line(coupon, current_month))
        .collect())
}

/// `>` marks the current month, `*` a coupon sitting in the wallet.
pub fn status_line(coupon: &Coupon, current_month: u8) -> String {
    let current = if coupon.month_number == current_month { ">" } else { " " };
    let wallet = if coupon.state.in_wallet() { "*" } else { " " };

    format!(
        "{current} {:>2} {:<10} {:<9} {wallet} {}",
        coupon.month_number, coupon.month_name, coupon.state, coupon.title
    )
}
