//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{BALANCE_TOLERANCE, MONEY_SCALE, exceeds_tolerance, has_money_scale, round_money};
