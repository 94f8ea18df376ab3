//! Core ledger logic for Tally.
//!
//! This crate has no web or database dependencies. Bookkeeping rules live in
//! [`ledger`], the unit-of-work seam every backend implements lives in
//! [`store`], and [`engine`] runs the public operations on top of both.
//!
//! # Modules
//!
//! - `ledger` - Double-entry rules, derivation, closing plan, reconciliation
//! - `store` - Storage seam and the in-memory store
//! - `engine` - Transactional ledger operations

pub mod engine;
pub mod ledger;
pub mod store;

pub use engine::LedgerEngine;
