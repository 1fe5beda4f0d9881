//! # Backend Configuration
//!
//! Configuration for the Flutterwave widget and the hosted ledger.
//! Keys are loaded from environment variables.

use cart_core::CartError;
use std::env;
use std::str::FromStr;

/// Name of the field carrying the public key in the widget config.
///
/// V3 keys are accepted under `public_key`; older widget builds only
/// read `PBFPubKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyField {
    #[default]
    PublicKey,
    PbfPubKey,
}

impl KeyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyField::PublicKey => "public_key",
            KeyField::PbfPubKey => "PBFPubKey",
        }
    }
}

impl FromStr for KeyField {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public_key" => Ok(KeyField::PublicKey),
            "PBFPubKey" => Ok(KeyField::PbfPubKey),
            other => Err(CartError::Configuration(format!(
                "FLUTTERWAVE_KEY_FIELD must be public_key or PBFPubKey, got {}",
                other
            ))),
        }
    }
}

/// Flutterwave inline widget configuration
#[derive(Debug, Clone)]
pub struct FlutterwaveConfig {
    /// Public key (FLWPUBK-... or FLWPUBK_TEST-...)
    pub public_key: String,

    pub key_field: KeyField,

    /// Comma-separated payment methods offered in the widget
    pub payment_options: String,

    pub logo_url: Option<String>,

    /// Where the widget sends the shopper after payment
    pub redirect_url: Option<String>,
}

impl FlutterwaveConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `FLUTTERWAVE_PUBLIC_KEY`
    ///
    /// Optional: `FLUTTERWAVE_KEY_FIELD`, `FLUTTERWAVE_PAYMENT_OPTIONS`,
    /// `FLUTTERWAVE_LOGO_URL`, `FLUTTERWAVE_REDIRECT_URL`
    pub fn from_env() -> Result<Self, CartError> {
        dotenvy::dotenv().ok();

        let public_key = env::var("FLUTTERWAVE_PUBLIC_KEY").map_err(|_| {
            CartError::Configuration("FLUTTERWAVE_PUBLIC_KEY not set".to_string())
        })?;

        let key_field = match env::var("FLUTTERWAVE_KEY_FIELD") {
            Ok(value) => value.parse()?,
            Err(_) => KeyField::default(),
        };

        let mut config = Self::new(public_key).with_key_field(key_field);
        if let Ok(options) = env::var("FLUTTERWAVE_PAYMENT_OPTIONS") {
            config.payment_options = options;
        }
        config.logo_url = env::var("FLUTTERWAVE_LOGO_URL").ok();
        config.redirect_url = env::var("FLUTTERWAVE_REDIRECT_URL").ok();

        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            key_field: KeyField::default(),
            payment_options: "card, banktransfer, ussd".to_string(),
            logo_url: None,
            redirect_url: None,
        }
    }

    /// Check the key looks like a Flutterwave public key
    pub fn validate(&self) -> Result<(), CartError> {
        if !self.public_key.starts_with("FLWPUBK") {
            return Err(CartError::Configuration(
                "FLUTTERWAVE_PUBLIC_KEY must start with FLWPUBK".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.public_key.starts_with("FLWPUBK_TEST-")
    }

    /// Builder: set key field name
    pub fn with_key_field(mut self, key_field: KeyField) -> Self {
        self.key_field = key_field;
        self
    }

    /// Builder: set logo shown in the widget
    pub fn with_logo_url(mut self, url: impl Into<String>) -> Self {
        self.logo_url = Some(url.into());
        self
    }

    /// Builder: set post-payment redirect
    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

/// Hosted REST ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Service or anon API key
    pub api_key: String,

    /// Table receiving ledger rows
    pub table: String,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `LEDGER_URL`
    /// - `LEDGER_API_KEY`
    pub fn from_env() -> Result<Self, CartError> {
        dotenvy::dotenv().ok();

        let url = env::var("LEDGER_URL")
            .map_err(|_| CartError::Configuration("LEDGER_URL not set".to_string()))?;
        let api_key = env::var("LEDGER_API_KEY")
            .map_err(|_| CartError::Configuration("LEDGER_API_KEY not set".to_string()))?;

        let mut config = Self::new(url, api_key);
        if let Ok(table) = env::var("LEDGER_TABLE") {
            config.table = table;
        }
        Ok(config)
    }

    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: "consultation_purchases".to_string(),
        }
    }

    /// Builder: set target table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Insert endpoint for the configured table
    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}
