//! # Bank
//!
//! Shared coupon model for the server and the operator CLI.
//!
//! - [`coupons`]: the persisted record and its state set
//! - [`role`]: owner and recipient, and the [`role::Actor`] passed into every operation
//! - [`clock`]: where "the current month" comes from
//! - [`seed`]: deterministic content for all twelve months
//! - [`lifecycle`]: who may do what, and how a coupon is shown
pub mod clock;
pub mod coupons;
pub mod lifecycle;
pub mod role;
pub mod seed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coupons::{Coupon, CouponPatch, CouponState};
pub use lifecycle::{Action, Badge, Flags, LifecycleError};
pub use role::{Actor, Role};
