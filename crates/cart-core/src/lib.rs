//! # cart-core
//!
//! Core types and the checkout reconciliation engine for storefront-cart.
//!
//! This crate provides:
//! - `Cart` and `CartItem` with merge, quantity and totals rules
//! - `CartEngine` for persisted mutations and checkout attempts
//! - `PaymentGateway` trait for implementing payment providers
//! - `OrderLedger` trait for recording paid bookings
//! - `CartStore` and `CatalogStore` for persistence and catalog lookups
//! - `CartError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use cart_core::{CartEngine, CartItem, Currency, Identity, ItemKind, Price, SessionIdentity};
//!
//! let identity = Arc::new(SessionIdentity::new(Identity::user("u1", "ada@example.com", "Ada")));
//! let engine = CartEngine::builder(gateway, ledger, identity).build().await?;
//!
//! engine.add_item(CartItem::new("tpl-1", "Landing", Price::new(29.99, Currency::USD), ItemKind::Template)).await?;
//!
//! // Open the gateway, then wait for its callbacks to settle the attempt
//! let ticket = engine.initiate_checkout().await?;
//! let outcome = ticket.outcome().await?;
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod item;
pub mod ledger;
pub mod money;
pub mod store;

// Re-exports for convenience
pub use cart::{Cart, Totals};
pub use catalog::{BoxedCatalogStore, CatalogEntry, CatalogStore, StaticCatalog};
pub use checkout::{
    CheckoutAttempt, CheckoutOutcome, CheckoutPhase, CheckoutStatus, Customer, PaymentReceipt,
    SignalDisposition, TransactionRef,
};
pub use config::{CheckoutConfig, DEFAULT_PAYMENT_TIMEOUT, DEFAULT_READY_TIMEOUT};
pub use engine::{CartEngine, CartEngineBuilder, CartSnapshot, CheckoutTicket};
pub use error::{CartError, CartResult};
pub use gateway::{
    BoxedPaymentGateway, GatewayCallbacks, GatewayEvent, GatewayHandle, GatewaySignalSink,
    PaymentGateway, PaymentRequest,
};
pub use identity::{BoxedIdentityProvider, CartScope, Identity, IdentityProvider, SessionIdentity};
pub use item::{CartItem, ItemKind};
pub use ledger::{
    BoxedOrderLedger, ConsultationCategory, LedgerRecord, LedgerStatus, MemoryLedger, OrderLedger,
};
pub use money::{Currency, Price};
pub use store::{BoxedCartStore, CartStore, FileCartStore, MemoryCartStore};
