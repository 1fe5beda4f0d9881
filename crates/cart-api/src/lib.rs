//! # cart-api
//!
//! HTTP API layer for storefront-cart.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for the cart, catalog and checkout
//! - Callback endpoints the Flutterwave widget reports to
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/cart` | Cart snapshot |
//! | POST | `/api/v1/cart/items` | Add catalog item |
//! | POST | `/api/v1/cart/consultations` | Book consultation |
//! | GET | `/api/v1/products` | List products |
//! | POST | `/api/v1/checkout` | Open payment widget |
//! | POST | `/api/v1/checkout/{reference}/success` | Widget callback |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
