//! # Hosted REST backend
//!
//! PostgREST-style relational store reached over HTTPS.
//!
//! - select: `GET /rest/v1/<table>?select=*&order=month_number.asc`
//! - insert: `POST /rest/v1/<table>` with a JSON array
//! - update: `PATCH /rest/v1/<table>?id=eq.<id>`, `Prefer: return=representation`
//!
//! Every request carries the project key both as `apikey` and as a bearer token.
use async_trait::async_trait;
use bank::{Coupon, CouponPatch};
use reqwest::{
    Client, RequestBuilder, Response,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::Value;
use tracing::{debug, warn};

use super::{CouponStore, StoreError, StoreResult, check_months, sort_by_month};

pub const DEFAULT_TABLE: &str = "monthly_coupons";

const REST_PREFIX: &str = "rest/v1";

#[derive(Clone, Debug)]
pub struct RestStore {
    client: Client,
    endpoint: String,
}

impl RestStore {
    pub fn new(base_url: &str, table: &str, api_key: &str) -> StoreResult<Self> {
        let client = Client::builder()
            .default_headers(auth_headers(api_key))
            .build()?;

        Ok(Self {
            client,
            endpoint: table_endpoint(base_url, table),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CouponStore for RestStore {
    async fn select_all(&self) -> StoreResult<Vec<Coupon>> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("order", "month_number.asc")]);

        let rows: Vec<Value> = self.send(request).await?.json().await?;
        let coupons = decode_rows(rows);

        debug!("Fetched {} coupons from {}", coupons.len(), self.endpoint);

        Ok(coupons)
    }

    async fn select_month(&self, month: u8) -> StoreResult<Option<Coupon>> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*".to_string()), ("month_number", format!("eq.{month}"))]);

        let coupons: Vec<Coupon> = self.send(request).await?.json().await?;

        Ok(coupons.into_iter().next())
    }

    async fn insert(&self, batch: &[Coupon]) -> StoreResult<()> {
        let existing = self.select_all().await?;
        check_months(&existing, batch)?;

        if batch.is_empty() {
            return Ok(());
        }

        self.send(self.client.post(&self.endpoint).json(batch)).await?;

        Ok(())
    }

    async fn update(&self, id: &str, patch: &CouponPatch) -> StoreResult<Coupon> {
        let request = self
            .client
            .patch(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);

        let updated: Vec<Coupon> = self.send(request).await?.json().await?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// Rows that no longer match the record shape are skipped, not fatal.
fn decode_rows(rows: Vec<Value>) -> Vec<Coupon> {
    let mut coupons: Vec<Coupon> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);

            serde_json::from_value(row)
                .inspect_err(|e| warn!("Skipping undecodable row {id}: {e}"))
                .ok()
        })
        .collect();
    sort_by_month(&mut coupons);

    coupons
}

fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/{REST_PREFIX}/{table}", base_url.trim_end_matches('/'))
}

fn auth_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if api_key.is_empty() {
        return headers;
    }

    if let Ok(value) = HeaderValue::from_str(api_key) {
        headers.insert("apikey", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use bank::seed::seed_coupon;

    use super::*;

    #[test]
    fn test_table_endpoint() {
        assert_eq!(
            table_endpoint("https://project.example.co/", DEFAULT_TABLE),
            "https://project.example.co/rest/v1/monthly_coupons"
        );
        assert_eq!(
            table_endpoint("http://localhost:54321", "coupons"),
            "http://localhost:54321/rest/v1/coupons"
        );
    }

    #[test]
    fn test_auth_headers() {
        let headers = auth_headers("anon-key");
        assert_eq!(headers["apikey"], "anon-key");
        assert_eq!(headers[AUTHORIZATION], "Bearer anon-key");

        assert!(auth_headers("").is_empty());
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let rows = vec![
            serde_json::to_value(seed_coupon(8, 1)).unwrap(),
            serde_json::json!({"id": "broken", "month_number": "eight"}),
            serde_json::to_value(seed_coupon(1, 1)).unwrap(),
        ];

        let coupons = decode_rows(rows);

        let ids: Vec<&str> = coupons.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["coupon-1", "coupon-8"]);
    }
}
