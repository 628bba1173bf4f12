//! # Record Store
//!
//! Where coupons live between restarts. The manager only ever talks to the
//! [`CouponStore`] trait; three backends implement it:
//!
//! - [`memory::MemoryStore`]: a map behind a lock, for tests and local runs
//! - [`redis::RedisStore`]: one Redis hash, coupon id to JSON record
//! - [`rest::RestStore`]: a hosted PostgREST-style backend over HTTPS
//!
//! ## Contract
//!
//! - `select_all` returns coupons ordered by `month_number`
//! - `insert` refuses any batch that would give a month a second coupon
//! - `update` of an unknown id is [`StoreError::NotFound`]
//! - nothing is ever deleted
pub mod memory;
pub mod redis;
pub mod rest;

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use bank::{Coupon, CouponPatch, seed::seed_coupons};
use thiserror::Error;

use crate::config::{Config, StoreBackend};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Coupon {0} not found")]
    NotFound(String),

    #[error("Month {0} already has a coupon")]
    DuplicateMonth(u8),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store rejected request with {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn select_all(&self) -> StoreResult<Vec<Coupon>>;

    async fn select_month(&self, month: u8) -> StoreResult<Option<Coupon>> {
        Ok(self
            .select_all()
            .await?
            .into_iter()
            .find(|coupon| coupon.month_number == month))
    }

    async fn insert(&self, coupons: &[Coupon]) -> StoreResult<()>;

    /// Apply `patch` to the coupon with `id` and return the stored result.
    async fn update(&self, id: &str, patch: &CouponPatch) -> StoreResult<Coupon>;
}

/// Reject a batch that repeats a month, either internally or against `existing`.
pub fn check_months<'a>(
    existing: impl IntoIterator<Item = &'a Coupon>,
    batch: &[Coupon],
) -> StoreResult<()> {
    let mut months: HashSet<u8> = existing.into_iter().map(|c| c.month_number).collect();

    for coupon in batch {
        if !months.insert(coupon.month_number) {
            return Err(StoreError::DuplicateMonth(coupon.month_number));
        }
    }

    Ok(())
}

pub fn sort_by_month(coupons: &mut [Coupon]) {
    coupons.sort_by_key(|coupon| coupon.month_number);
}

/// The memory backend has nothing to outlive, so it starts out seeded for
/// `current_month`. The others are used as found.
pub async fn init_store(config: &Config, current_month: u8) -> StoreResult<Arc<dyn CouponStore>> {
    let store: Arc<dyn CouponStore> = match config.store {
        StoreBackend::Memory => Arc::new(
            memory::MemoryStore::with_coupons(seed_coupons(current_month)).await?,
        ),
        StoreBackend::Redis => Arc::new(
            redis::RedisStore::connect(&config.redis_url, &config.redis_hash_key).await?,
        ),
        StoreBackend::Rest => Arc::new(rest::RestStore::new(
            &config.rest_url,
            &config.rest_table,
            config.rest_api_key.as_deref().unwrap_or_default(),
        )?),
    };

    Ok(store)
}
