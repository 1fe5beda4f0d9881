//! # Cart Items
//!
//! Line items held by the cart. Name, price and image are snapshots taken
//! when the item is added; they are never re-synced with the catalog.

use crate::money::Price;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// What kind of thing a line item is.
///
/// The set is open: tags this crate does not know are carried verbatim
/// in [`ItemKind::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Template,
    Plugin,
    Api,
    Vps,
    Server,
    Consultation,
    Other(String),
}

impl ItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            ItemKind::Template => "template",
            ItemKind::Plugin => "plugin",
            ItemKind::Api => "api",
            ItemKind::Vps => "vps",
            ItemKind::Server => "server",
            ItemKind::Consultation => "consultation",
            ItemKind::Other(tag) => tag.as_str(),
        }
    }

    /// Each add of an ephemeral kind is a distinct purchase: it never merges
    /// and its quantity is always 1.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, ItemKind::Consultation)
    }

    /// Bookable services get an Order Ledger record after payment.
    pub fn is_bookable(&self) -> bool {
        matches!(self, ItemKind::Consultation)
    }
}

impl From<&str> for ItemKind {
    fn from(tag: &str) -> Self {
        match tag {
            "template" => ItemKind::Template,
            "plugin" => ItemKind::Plugin,
            "api" => ItemKind::Api,
            "vps" => ItemKind::Vps,
            "server" => ItemKind::Server,
            "consultation" => ItemKind::Consultation,
            other => ItemKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ItemKind::from(tag.as_str()))
    }
}

fn default_quantity() -> u32 {
    1
}

/// A line in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog id, or a minted id for ephemeral items
    pub id: String,

    /// Display name captured at add-time
    pub name: String,

    /// Unit price captured at add-time
    pub price: Price,

    /// Display-only image URL
    #[serde(default)]
    pub image: String,

    /// Item kind
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Quantity (minimum 1)
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl CartItem {
    /// Create a line with quantity 1
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
        kind: ItemKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: String::new(),
            kind,
            quantity: 1,
        }
    }

    /// A consultation booking with a freshly minted id
    pub fn consultation(name: impl Into<String>, price: Price) -> Self {
        Self::new(
            format!("consultation-{}", Uuid::new_v4()),
            name,
            price,
            ItemKind::Consultation,
        )
    }

    /// Builder: set image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = url.into();
        self
    }

    /// Builder: set quantity
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Price × quantity, or `None` if it overflows
    pub fn line_total(&self) -> Option<Price> {
        self.price.checked_times(self.quantity)
    }

    /// Whether a later add with the same id folds into this line
    pub fn is_mergeable(&self) -> bool {
        !self.kind.is_ephemeral()
    }
}
