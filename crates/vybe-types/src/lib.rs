//! Vybe Types - Shared domain types
//!
//! This crate contains domain types used across the Vybe asset store:
//! - User identity
//! - Access tiers and entitlements
//! - Catalog assets

pub mod asset;
pub mod entitlement;
pub mod tier;
pub mod user;

pub use asset::*;
pub use entitlement::*;
pub use tier::*;
pub use user::*;
