//! Domain models for storefront.
//!
//! Validated domain objects returned by the repositories, separate from the
//! database row types.

pub mod katana;
pub mod quote;
pub mod session;
pub mod user;

pub use katana::{Draft, Katana};
pub use quote::{Customer, Order, Quote, StoredAddress};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
