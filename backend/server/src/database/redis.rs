//! # Redis
//!
//! RAM database.
//!
//! ## Requirements
//!
//! - Twelve records, forever
//! - Whole-calendar reads on every page load
//! - Single-record writes on every transition
//!
//! ## Implementation
//!
//! - Redis hash: 1 big key, then key-value pairs
//! - Field is the coupon id, value is the JSON record
//! - Updates are read, patch, write back; the manager already serialises its own mutations
use std::collections::HashMap;

use ::redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use async_trait::async_trait;
use bank::{Coupon, CouponPatch};
use tracing::{info, warn};

use super::{CouponStore, StoreError, StoreResult, check_months, sort_by_month};

pub const DEFAULT_HASH_KEY: &str = "coupons";

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    hash_key: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, hash_key: &str) -> StoreResult<Self> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        info!("Connected to Redis, using hash {hash_key}");

        Ok(Self {
            connection,
            hash_key: hash_key.to_string(),
        })
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Coupon>> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.hget(&self.hash_key, id).await?;

        raw.map(|json| decode(&json)).transpose()
    }

    async fn put(&self, coupon: &Coupon) -> StoreResult<()> {
        let mut connection = self.connection.clone();
        let () = connection
            .hset(&self.hash_key, &coupon.id, encode(coupon)?)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CouponStore for RedisStore {
    async fn select_all(&self) -> StoreResult<Vec<Coupon>> {
        let mut connection = self.connection.clone();
        let raw: HashMap<String, String> = connection.hgetall(&self.hash_key).await?;

        Ok(decode_all(raw))
    }

    async fn insert(&self, batch: &[Coupon]) -> StoreResult<()> {
        let existing = self.select_all().await?;
        check_months(&existing, batch)?;

        let items = batch
            .iter()
            .map(|coupon| Ok((coupon.id.clone(), encode(coupon)?)))
            .collect::<StoreResult<Vec<(String, String)>>>()?;

        if items.is_empty() {
            return Ok(());
        }

        let mut connection = self.connection.clone();
        let () = connection.hset_multiple(&self.hash_key, &items).await?;

        Ok(())
    }

    async fn update(&self, id: &str, patch: &CouponPatch) -> StoreResult<Coupon> {
        let mut coupon = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        coupon.apply(patch);
        self.put(&coupon).await?;

        Ok(coupon)
    }
}

fn encode(coupon: &Coupon) -> StoreResult<String> {
    Ok(serde_json::to_string(coupon)?)
}

fn decode(json: &str) -> StoreResult<Coupon> {
    Ok(serde_json::from_str(json)?)
}

/// One bad field never hides the rest of the calendar.
fn decode_all(raw: HashMap<String, String>) -> Vec<Coupon> {
    let mut coupons: Vec<Coupon> = raw
        .iter()
        .filter_map(|(id, json)| {
            decode(json)
                .inspect_err(|e| warn!("Skipping undecodable record {id}: {e}"))
                .ok()
        })
        .collect();
    sort_by_month(&mut coupons);

    coupons
}
