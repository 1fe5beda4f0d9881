//! # Routes
//!
//! Axum router configuration for the cart API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Cart (scoped by the `x-session-id` / `x-user-*` headers):
///   - GET    /api/v1/cart - Cart lines, totals and checkout status
///   - DELETE /api/v1/cart - Empty the cart
///   - POST   /api/v1/cart/items - Add a catalog item
///   - PATCH  /api/v1/cart/items/{item_id} - Set quantity
///   - DELETE /api/v1/cart/items/{item_id} - Remove a line
///   - POST   /api/v1/cart/consultations - Book a consultation
///
/// - Catalog:
///   - GET /api/v1/products - List active products
///   - GET /api/v1/products/{product_id} - Get product by ID
///
/// - Checkout:
///   - POST /api/v1/checkout - Open the payment widget
///   - GET  /api/v1/checkout - Checkout status
///   - POST /api/v1/checkout/reset - Acknowledge a finished attempt
///
/// - Gateway callbacks (keyed by transaction reference):
///   - POST /api/v1/checkout/{reference}/ready
///   - POST /api/v1/checkout/{reference}/success
///   - POST /api/v1/checkout/{reference}/failure
///   - POST /api/v1/checkout/{reference}/cancel
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Cart
        .route("/cart", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/cart/items", post(handlers::add_item))
        .route(
            "/cart/items/{item_id}",
            patch(handlers::update_item).delete(handlers::remove_item),
        )
        .route("/cart/consultations", post(handlers::book_consultation))
        // Catalog
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        // Checkout
        .route(
            "/checkout",
            post(handlers::create_checkout).get(handlers::get_checkout),
        )
        .route("/checkout/reset", post(handlers::reset_checkout))
        // Gateway callbacks
        .route("/checkout/{reference}/ready", post(handlers::gateway_ready))
        .route("/checkout/{reference}/success", post(handlers::gateway_success))
        .route("/checkout/{reference}/failure", post(handlers::gateway_failure))
        .route("/checkout/{reference}/cancel", post(handlers::gateway_cancel));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
