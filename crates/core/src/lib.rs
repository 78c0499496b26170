//! Katana Forge Core - Shared domain library.
//!
//! This crate provides the domain types and rules used by every Katana Forge
//! component:
//! - `storefront` - The configurator storefront HTTP API
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Money is integer cents, VAT is computed
//! per line, and every request payload is validated here before the
//! storefront touches the database.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, colors and status enums
//! - [`money`] - Cents and per-line VAT arithmetic
//! - [`katana`] - The configuration object bound to the 3D configurator
//! - [`pricing`] - Price estimates and checkout totals
//! - [`drafts`] - Draft snapshots and the sign-in merge
//! - [`cart`] - Session cart operations
//! - [`numbering`] - Quote numbers
//! - [`checkout`] - Checkout payload validation
//! - [`account`] - Registration, login and preference payloads
//! - [`validation`] - Field-level validation errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod cart;
pub mod checkout;
pub mod drafts;
pub mod katana;
pub mod money;
pub mod numbering;
pub mod pricing;
pub mod types;
pub mod validation;

pub use money::{Cents, MoneyError};
pub use numbering::QuoteNumber;
pub use types::*;
pub use validation::ValidationErrors;
