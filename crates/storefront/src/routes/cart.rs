//! Server-side cart stored in the session.

use axum::{Json, extract::Path};
use katana_forge_core::ValidationErrors;
use katana_forge_core::cart::{Cart, CartItem, CartItemInput};
use katana_forge_core::pricing::QuoteTotals;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, Result};
use crate::extract::{Payload, Valid};
use crate::models::session_keys;

/// Cart content with its totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub total_quantity: u32,
    pub totals: QuoteTotals,
}

impl CartResponse {
    fn new(cart: Cart) -> Result<Json<Self>> {
        let totals = cart.totals()?;
        Ok(Json(Self {
            total_quantity: cart.total_quantity(),
            items: cart.items,
            totals,
        }))
    }
}

/// Body of `PUT /api/cart/items/{id}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantityInput {
    pub qty: i64,
}

impl Payload for QuantityInput {
    type Valid = i64;
    const INVALID_MESSAGE: &'static str = "Quantité invalide";

    fn validate(self) -> std::result::Result<Self::Valid, ValidationErrors> {
        Ok(self.qty)
    }
}

async fn load(session: &Session) -> Result<Cart> {
    let cart: Option<Cart> = session.get(session_keys::CART).await?;
    Ok(cart.unwrap_or_default().normalize())
}

async fn store(session: &Session, cart: Cart) -> Result<Json<CartResponse>> {
    session.insert(session_keys::CART, &cart).await?;
    CartResponse::new(cart)
}

/// `GET /api/cart`
pub async fn show(session: Session) -> Result<Json<CartResponse>> {
    CartResponse::new(load(&session).await?)
}

/// Add an item, merging with a line of the same id.
///
/// # Route
///
/// `POST /api/cart/items`
pub async fn add_item(
    session: Session,
    Valid(item): Valid<CartItemInput>,
) -> Result<Json<CartResponse>> {
    let mut cart = load(&session).await?;
    cart.add_item(item)
        .map_err(|issues| AppError::invalid(CartItemInput::INVALID_MESSAGE, issues))?;
    store(&session, cart).await
}

/// Change a quantity; zero or less removes the line.
///
/// # Route
///
/// `PUT /api/cart/items/{id}`
pub async fn update_item(
    session: Session,
    Path(id): Path<String>,
    Valid(qty): Valid<QuantityInput>,
) -> Result<Json<CartResponse>> {
    let mut cart = load(&session).await?;
    if !cart.set_item_quantity(&id, qty) {
        return Err(AppError::NotFound("Article introuvable".to_string()));
    }
    store(&session, cart).await
}

/// `DELETE /api/cart/items/{id}`
pub async fn remove_item(session: Session, Path(id): Path<String>) -> Result<Json<CartResponse>> {
    let mut cart = load(&session).await?;
    cart.remove_item(&id);
    store(&session, cart).await
}

/// `DELETE /api/cart`
pub async fn clear(session: Session) -> Result<Json<CartResponse>> {
    let mut cart = load(&session).await?;
    cart.clear();
    store(&session, cart).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
        routing::{get, post, put},
    };
    use tower::ServiceExt;
    use katana_forge_core::cart::MAX_CART_LINES;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/api/cart", get(show).delete(clear))
            .route("/api/cart/items", post(add_item))
            .route("/api/cart/items/{id}", put(update_item).delete(remove_item))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned()
    }

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    const ITEM: &str = r#"{"id":"kage","sku":"KAT-001","name":"Katana Kage","qty":2,"unitCents":45000,"vatRatePct":20}"#;

    #[tokio::test]
    async fn test_empty_cart_has_default_shipping() {
        let response = app()
            .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["totalQuantity"], 0);
        assert_eq!(body["totals"]["shippingCents"], 2500);
    }

    #[tokio::test]
    async fn test_add_update_and_remove() {
        let app = app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/cart/items", None, ITEM))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        let body = json(response).await;
        assert_eq!(body["totalQuantity"], 2);
        assert_eq!(body["items"][0]["sku"], "KAT-001");

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/cart/items", Some(&cookie), ITEM))
            .await
            .unwrap();
        assert_eq!(json(response).await["totalQuantity"], 4);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/cart/items/kage",
                Some(&cookie),
                r#"{"qty":150}"#,
            ))
            .await
            .unwrap();
        assert_eq!(json(response).await["totalQuantity"], 99);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/cart/items/unknown",
                Some(&cookie),
                r#"{"qty":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/cart/items/kage")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["totalQuantity"], 0);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_item_is_unprocessable() {
        let response = app()
            .oneshot(json_request(
                "POST",
                "/api/cart/items",
                None,
                r#"{"id":"kage","sku":"","name":"Katana","qty":0,"unitCents":-1,"vatRatePct":20}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(response).await["error"], "Article invalide");
    }

    #[tokio::test]
    async fn test_full_cart_refuses_new_line() {
        let app = app();
        let mut cookie: Option<String> = None;
        for n in 0..MAX_CART_LINES {
            let body = ITEM.replace("\"kage\"", &format!("\"kage-{n}\""));
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/cart/items", cookie.as_deref(), &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            if cookie.is_none() {
                cookie = Some(session_cookie(&response));
            }
        }

        let response = app
            .oneshot(json_request("POST", "/api/cart/items", cookie.as_deref(), ITEM))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert_eq!(body["error"], "Article invalide");
        let message = body["issues"]["formErrors"][0].as_str().unwrap();
        assert!(message.contains(&MAX_CART_LINES.to_string()));
    }
}
