use std::fmt;

use serde::{Deserialize, Serialize};

/// The two people using the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authors coupon content and approves redemptions.
    Owner,
    /// Saves coupons and asks for them to be redeemed.
    Recipient,
}

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Role::Owner } else { Role::Recipient }
    }

    pub fn is_owner(self) -> bool {
        self == Role::Owner
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Recipient => f.write_str("recipient"),
        }
    }
}

/// Who is acting. Passed explicitly into every lifecycle operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn owner(username: impl Into<String>) -> Self {
        Self::new(username, Role::Owner)
    }

    pub fn recipient(username: impl Into<String>) -> Self {
        Self::new(username, Role::Recipient)
    }
}
