//! # cart-backend
//!
//! Payment gateway and ledger adapters for storefront-cart.
//!
//! ## Components
//!
//! - [`FlutterwaveInlineGateway`] - Flutterwave inline widget (`v3.js`)
//! - [`FlutterwaveCallback`] - Parses the widget's callback payload
//! - [`RestLedger`] - Appends paid bookings to a hosted REST table
//!
//! ## Example
//!
//! ```rust,ignore
//! use cart_backend::{FlutterwaveInlineGateway, RestLedger};
//!
//! let gateway = Arc::new(FlutterwaveInlineGateway::from_env()?);
//! let ledger = Arc::new(RestLedger::from_env()?);
//! let engine = CartEngine::builder(gateway, ledger, identity).build().await?;
//! ```

pub mod config;
pub mod flutterwave;
pub mod ledger;

pub use config::{FlutterwaveConfig, KeyField, LedgerConfig};
pub use flutterwave::{FlutterwaveCallback, FlutterwaveInlineGateway, CHECKOUT_SCRIPT_URL};
pub use ledger::{LedgerRow, RestLedger};
