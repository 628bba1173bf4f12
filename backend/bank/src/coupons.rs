//! # Coupons
//!
//! One coupon per calendar month. The record shape matches what the hosted
//! store persists, field for field:
//!
//! `{id, month_number, month_name, title, description, state, unlock_date?, use_date?, icon, gem_color}`
//!
//! Only `state`, `title`, `description` and the two dates ever change after seeding.
use std::{convert::Infallible, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FIRST_MONTH: u8 = 1;
pub const LAST_MONTH: u8 = 12;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn is_valid_month(month: u8) -> bool {
    (FIRST_MONTH..=LAST_MONTH).contains(&month)
}

pub fn month_name(month: u8) -> Option<&'static str> {
    if !is_valid_month(month) {
        return None;
    }

    Some(MONTH_NAMES[(month - 1) as usize])
}

/// Stored coupon state.
///
/// Anything the store hands back outside the known five is kept verbatim in
/// [`CouponState::Unrecognised`] so it can be written back untouched. No
/// transition ever produces it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CouponState {
    Locked,
    Unlocked,
    Used,
    Saved,
    Pending,
    Unrecognised(String),
}

impl CouponState {
    pub fn as_str(&self) -> &str {
        match self {
            CouponState::Locked => "locked",
            CouponState::Unlocked => "unlocked",
            CouponState::Used => "used",
            CouponState::Saved => "saved",
            CouponState::Pending => "pending",
            CouponState::Unrecognised(raw) => raw,
        }
    }

    /// Saved or waiting for approval, i.e. sitting in the wallet.
    pub fn in_wallet(&self) -> bool {
        matches!(self, CouponState::Saved | CouponState::Pending)
    }

    pub fn is_recognised(&self) -> bool {
        !matches!(self, CouponState::Unrecognised(_))
    }
}

impl FromStr for CouponState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "locked" => CouponState::Locked,
            "unlocked" => CouponState::Unlocked,
            "used" => CouponState::Used,
            "saved" => CouponState::Saved,
            "pending" => CouponState::Pending,
            _ => CouponState::Unrecognised(s.to_string()),
        })
    }
}

impl From<String> for CouponState {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl From<CouponState> for String {
    fn from(state: CouponState) -> Self {
        match state {
            CouponState::Unrecognised(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CouponState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub month_number: u8,
    pub month_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub state: CouponState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub gem_color: String,
}

impl Coupon {
    pub fn apply(&mut self, patch: &CouponPatch) {
        if let Some(state) = &patch.state {
            self.state = state.clone();
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(unlock_date) = patch.unlock_date {
            self.unlock_date = Some(unlock_date);
        }
        if let Some(use_date) = patch.use_date {
            self.use_date = Some(use_date);
        }
    }
}

/// Partial update sent to the store. Absent fields stay as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CouponState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_date: Option<DateTime<Utc>>,
}

impl CouponPatch {
    pub fn is_empty(&self) -> bool {
        self == &CouponPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_names() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }

    #[test]
    fn test_state_parsing_is_lenient() {
        assert_eq!("Saved".parse::<CouponState>().unwrap(), CouponState::Saved);
        assert_eq!(
            "archived".parse::<CouponState>().unwrap(),
            CouponState::Unrecognised("archived".to_string())
        );
        assert_eq!(String::from(CouponState::Unrecognised("archived".into())), "archived");
    }

    #[test]
    fn test_record_shape() {
        let json = r#"{
            "id": "c-3",
            "month_number": 3,
            "month_name": "March",
            "title": "Spa day",
            "state": "mystery",
            "icon": "gem",
            "gem_color": "teal"
        }"#;

        let coupon: Coupon = serde_json::from_str(json).unwrap();
        assert_eq!(coupon.description, "");
        assert_eq!(coupon.state, CouponState::Unrecognised("mystery".to_string()));
        assert!(coupon.use_date.is_none());

        let value = serde_json::to_value(&coupon).unwrap();
        assert_eq!(value["state"], "mystery");
        assert!(value.get("use_date").is_none());
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut coupon: Coupon = serde_json::from_str(
            r#"{"id":"c-1","month_number":1,"month_name":"January","title":"Hug","description":"Long one","state":"saved"}"#,
        )
        .unwrap();

        coupon.apply(&CouponPatch {
            state: Some(CouponState::Pending),
            ..Default::default()
        });

        assert_eq!(coupon.state, CouponState::Pending);
        assert_eq!(coupon.title, "Hug");
        assert_eq!(coupon.description, "Long one");
        assert!(CouponPatch::default().is_empty());
    }
}
