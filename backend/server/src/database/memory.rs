//! In-memory store, for tests and local development.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bank::{Coupon, CouponPatch};
use tokio::sync::RwLock;

use super::{CouponStore, StoreError, StoreResult, check_months, sort_by_month};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    coupons: Arc<RwLock<HashMap<String, Coupon>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_coupons(coupons: Vec<Coupon>) -> StoreResult<Self> {
        let store = Self::new();
        store.insert(&coupons).await?;

        Ok(store)
    }

    pub async fn len(&self) -> usize {
        self.coupons.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.coupons.read().await.is_empty()
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn select_all(&self) -> StoreResult<Vec<Coupon>> {
        let coupons = self.coupons.read().await;

        let mut all: Vec<Coupon> = coupons.values().cloned().collect();
        sort_by_month(&mut all);

        Ok(all)
    }

    async fn insert(&self, batch: &[Coupon]) -> StoreResult<()> {
        let mut coupons = self.coupons.write().await;
        check_months(coupons.values(), batch)?;

        for coupon in batch {
            coupons.insert(coupon.id.clone(), coupon.clone());
        }

        Ok(())
    }

    async fn update(&self, id: &str, patch: &CouponPatch) -> StoreResult<Coupon> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        coupon.apply(patch);

        Ok(coupon.clone())
    }
}
