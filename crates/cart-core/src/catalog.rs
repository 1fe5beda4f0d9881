//! # Catalog
//!
//! Read-only view of sellable items. Items are copied into the cart at
//! add-time, so catalog edits never reach existing cart lines.
//! The bundled implementation is loaded from `config/catalog.toml`.

use crate::error::CartResult;
use crate::item::{CartItem, ItemKind};
use crate::money::Price;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An item offered for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique item identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Current price
    pub price: Price,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Item kind
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Whether this item is available for purchase
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Price, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            image: None,
            kind,
            active: true,
        }
    }

    /// Builder: set image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Snapshot into a cart line
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        let item = CartItem::new(self.id.clone(), self.name.clone(), self.price, self.kind.clone())
            .with_quantity(quantity);
        match &self.image {
            Some(url) => item.with_image(url.clone()),
            None => item,
        }
    }
}

/// Read-only catalog lookup
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find an item by id (inactive items included)
    async fn get(&self, id: &str) -> CartResult<Option<CatalogEntry>>;

    /// All items currently for sale
    async fn list_active(&self) -> CartResult<Vec<CatalogEntry>>;
}

/// Type alias for a shared catalog
pub type BoxedCatalogStore = Arc<dyn CatalogStore>;

/// Catalog held in memory (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub items: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn add(&mut self, entry: CatalogEntry) {
        self.items.push(entry);
    }

    /// Builder: add an entry
    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.add(entry);
        self
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[async_trait]
impl CatalogStore for StaticCatalog {
    async fn get(&self, id: &str) -> CartResult<Option<CatalogEntry>> {
        Ok(self.items.iter().find(|entry| entry.id == id).cloned())
    }

    async fn list_active(&self) -> CartResult<Vec<CatalogEntry>> {
        Ok(self.items.iter().filter(|entry| entry.active).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    const CATALOG: &str = r#"
[[items]]
id = "tpl-1"
name = "SaaS Landing Template"
type = "template"
image = "https://cdn.example.com/tpl-1.png"
price = { amount = 2999, currency = "usd" }

[[items]]
id = "vps-small"
name = "Small VPS"
type = "vps"
active = false
price = { amount = 500, currency = "usd" }
"#;

    #[tokio::test]
    async fn test_load_from_toml() {
        let catalog = StaticCatalog::from_toml(CATALOG).unwrap();

        let tpl = catalog.get("tpl-1").await.unwrap().unwrap();
        assert_eq!(tpl.kind, ItemKind::Template);
        assert_eq!(tpl.price, Price::from_cents(2999, Currency::USD));

        let active = catalog.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(catalog.get("vps-small").await.unwrap().is_some());
    }

    #[test]
    fn test_snapshot_copies_fields() {
        let entry = CatalogEntry::new("api-1", "Geo API", Price::new(9.0, Currency::USD), ItemKind::Api)
            .with_image("https://cdn.example.com/api.png");
        let item = entry.to_cart_item(2);

        assert_eq!(item.id, "api-1");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.image, "https://cdn.example.com/api.png");
        assert_eq!(item.line_total().unwrap().amount, 1800);
    }
}
