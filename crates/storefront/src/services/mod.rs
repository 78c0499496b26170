//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Account registration, password login and Google sign-in
//! - `checkout` - Quote creation and direct Stripe payment
//! - `email` - Quote delivery over SMTP
//! - `fulfillment` - Orders recorded from completed Stripe sessions
//! - `pdf` - Quote PDF rendering
//! - `storage` - Where quote PDFs are kept (local disk, GCS, Azure)
//! - `stripe` - Checkout Sessions API and webhook verification

pub mod auth;
pub mod checkout;
pub mod email;
pub mod fulfillment;
pub mod pdf;
pub mod storage;
pub mod stripe;
