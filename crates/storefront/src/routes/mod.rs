//! HTTP route handlers for the storefront.
//!
//! # Route structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/register          - Create an account (rate limited)
//! POST   /api/auth/login             - Password login (rate limited)
//! POST   /api/auth/logout            - Logout
//! GET    /api/auth/me                - Current user
//! GET    /auth/google/login          - Redirect to Google
//! GET    /auth/google/callback       - Google OAuth callback
//!
//! # Configurator (requires auth unless noted)
//! GET    /api/katanas                - List saved katanas
//! POST   /api/katanas                - Save a katana
//! GET    /api/katanas/{id}           - Show
//! PUT    /api/katanas/{id}           - Update
//! DELETE /api/katanas/{id}           - Delete
//! GET    /api/drafts                 - Current draft (guest or user)
//! PUT    /api/drafts                 - Save draft (guest or user)
//! POST   /api/drafts/merge           - Merge guest and local drafts into the user's
//! POST   /api/quotes                 - Price estimate (guest or user)
//! PUT    /api/preferences/background - Background color
//!
//! # Cart (session)
//! GET    /api/cart                   - Cart with totals
//! DELETE /api/cart                   - Empty the cart
//! POST   /api/cart/items             - Add an item
//! PUT    /api/cart/items/{id}        - Change quantity
//! DELETE /api/cart/items/{id}        - Remove an item
//!
//! # Checkout
//! POST   /api/checkout/quote         - Create and email a quote (rate limited)
//! POST   /api/checkout/pay           - Stripe session for direct payment (rate limited)
//! GET    /api/quote/{id}/pdf         - Quote PDF, keyed by customer email
//! POST   /api/stripe/webhook         - Stripe events (signature checked, no CSRF)
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod drafts;
pub mod google_auth;
pub mod katanas;
pub mod preferences;
pub mod quotes;
pub mod stripe_webhook;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the account routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the Google OAuth routes router.
pub fn google_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(google_auth::login))
        .route("/callback", get(google_auth::callback))
}

/// Create the katana routes router.
pub fn katana_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(katanas::list).post(katanas::create))
        .route(
            "/{id}",
            get(katanas::show)
                .put(katanas::update)
                .delete(katanas::remove),
        )
}

/// Create the draft routes router.
pub fn draft_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(drafts::show).put(drafts::save))
        .route("/merge", post(drafts::merge))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(checkout::create_quote))
        .route("/pay", post(checkout::pay_now))
        .layer(checkout_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/katanas", katana_routes())
        .nest("/drafts", draft_routes())
        .route("/quotes", post(quotes::estimate_price))
        .route("/preferences/background", put(preferences::set_background))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/quote/{id}/pdf", get(checkout::quote_pdf))
        .route("/stripe/webhook", post(stripe_webhook::receive));

    Router::new()
        .nest("/api", api)
        .nest("/auth/google", google_routes())
}
