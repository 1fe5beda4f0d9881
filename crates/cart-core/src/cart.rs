//! # Cart State
//!
//! The ordered line-item collection and its mutation rules.
//! Totals are always recomputed from the lines; nothing is cached.

use crate::error::{CartError, CartResult};
use crate::item::CartItem;
use crate::money::{Currency, Price};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of quantities
    pub total_items: u32,
    /// Sum of price × quantity
    pub total_price: Price,
}

/// Line items a shopper intends to buy.
///
/// Only the mutation methods below can change the lines; callers get
/// read-only access through [`Cart::items`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    currency: Currency,
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart priced in `currency`
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            items: Vec::new(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check a candidate without touching the cart
    pub fn validate(&self, candidate: &CartItem) -> CartResult<()> {
        if candidate.id.trim().is_empty() {
            return Err(CartError::Validation("item id must not be empty".to_string()));
        }
        if candidate.price.is_negative() {
            return Err(CartError::Validation(format!(
                "price must not be negative (got {})",
                candidate.price.amount
            )));
        }
        if candidate.quantity == 0 {
            return Err(CartError::Validation("quantity must be at least 1".to_string()));
        }
        if candidate.kind.is_ephemeral() && candidate.quantity != 1 {
            return Err(CartError::Validation(format!(
                "{} lines are booked one at a time",
                candidate.kind
            )));
        }
        if candidate.price.currency != self.currency {
            return Err(CartError::Validation(format!(
                "item is priced in {}, cart uses {}",
                candidate.price.currency, self.currency
            )));
        }
        Ok(())
    }

    /// Add a line, merging into an existing line with the same id.
    /// Returns the id of the line that now holds the candidate.
    ///
    /// Ephemeral kinds never merge; a colliding id is replaced with a fresh one.
    /// The cart is unchanged on error.
    pub fn add(&mut self, mut candidate: CartItem) -> CartResult<String> {
        self.validate(&candidate)?;

        let mut next = self.items.clone();
        if !candidate.is_mergeable() {
            while next.iter().any(|line| line.id == candidate.id) {
                candidate.id = format!("{}-{}", candidate.kind, Uuid::new_v4());
            }
            next.push(candidate.clone());
        } else {
            match next
                .iter_mut()
                .find(|line| line.id == candidate.id && line.is_mergeable())
            {
                Some(line) => {
                    line.quantity = line.quantity.checked_add(candidate.quantity).ok_or_else(|| {
                        CartError::Validation(format!("quantity overflow for {}", candidate.id))
                    })?;
                }
                None => next.push(candidate.clone()),
            }
        }

        self.commit(next)?;
        Ok(candidate.id)
    }

    /// Remove every line with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Set a line's quantity exactly; zero or less removes the line.
    /// Returns whether the cart changed.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) -> CartResult<bool> {
        if quantity <= 0 {
            return Ok(self.remove(id));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CartError::Validation(format!("quantity {} is too large", quantity)))?;

        let mut next = self.items.clone();
        let mut changed = false;
        for line in next.iter_mut().filter(|line| line.id == id) {
            if line.kind.is_ephemeral() && quantity != 1 {
                return Err(CartError::Validation(format!(
                    "{} lines are booked one at a time",
                    line.kind
                )));
            }
            changed |= line.quantity != quantity;
            line.quantity = quantity;
        }
        if changed {
            self.commit(next)?;
        }
        Ok(changed)
    }

    /// Replace the lines if their totals stay representable
    fn commit(&mut self, items: Vec<CartItem>) -> CartResult<()> {
        sum_lines(&items, self.currency)?;
        self.items = items;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Totals recomputed from the lines.
    ///
    /// Mutations refuse any state whose totals would overflow, so the
    /// saturating fallback only applies to carts built outside those rules.
    pub fn totals(&self) -> Totals {
        sum_lines(&self.items, self.currency).unwrap_or_else(|_| Totals {
            total_items: u32::MAX,
            total_price: Price::from_cents(i64::MAX, self.currency),
        })
    }
}

fn sum_lines(items: &[CartItem], currency: Currency) -> CartResult<Totals> {
    let mut totals = Totals {
        total_items: 0,
        total_price: Price::zero(currency),
    };
    for item in items {
        let overflow = || CartError::Validation(format!("cart total overflows at {}", item.id));
        totals.total_items = totals
            .total_items
            .checked_add(item.quantity)
            .ok_or_else(overflow)?;
        totals.total_price = item
            .line_total()
            .and_then(|line| totals.total_price.checked_add(line))
            .ok_or_else(overflow)?;
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemKind;

    fn template(id: &str, price: f64) -> CartItem {
        CartItem::new(id, "Template", Price::new(price, Currency::USD), ItemKind::Template)
    }

    fn recomputed(cart: &Cart) -> i64 {
        cart.items()
            .iter()
            .map(|i| i.price.amount * i.quantity as i64)
            .sum()
    }

    #[test]
    fn test_same_id_merges() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("tpl-1", 29.99)).unwrap();
        cart.add(template("tpl-1", 29.99).with_quantity(2)).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get("tpl-1").unwrap().quantity, 3);

        let totals = cart.totals();
        assert_eq!(totals.total_items, 3);
        assert_eq!(totals.total_price.amount, 8997);
        assert_eq!(totals.total_price.display(), "$89.97");
    }

    #[test]
    fn test_price_is_snapshot_of_first_add() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("tpl-1", 10.0)).unwrap();
        cart.add(template("tpl-1", 12.0)).unwrap();

        assert_eq!(cart.get("tpl-1").unwrap().price.amount, 1000);
        assert_eq!(cart.totals().total_price.amount, 2000);
    }

    #[test]
    fn test_consultations_never_merge() {
        let mut cart = Cart::new(Currency::USD);
        let price = Price::new(25.0, Currency::USD);
        let booking = CartItem::consultation("General Consultation", price);

        cart.add(booking.clone()).unwrap();
        cart.add(booking).unwrap();

        assert_eq!(cart.len(), 2);
        assert_ne!(cart.items()[0].id, cart.items()[1].id);
    }

    #[test]
    fn test_validation_rejects_and_leaves_cart() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("tpl-1", 5.0)).unwrap();
        let before = cart.clone();

        let negative = CartItem::new("bad", "Bad", Price::from_cents(-1, Currency::USD), ItemKind::Api);
        assert!(matches!(cart.add(negative), Err(CartError::Validation(_))));

        assert!(matches!(cart.add(template("  ", 5.0)), Err(CartError::Validation(_))));
        assert!(matches!(
            cart.add(template("tpl-2", 5.0).with_quantity(0)),
            Err(CartError::Validation(_))
        ));

        let euro = CartItem::new("eu", "Euro", Price::new(5.0, Currency::EUR), ItemKind::Plugin);
        assert!(matches!(cart.add(euro), Err(CartError::Validation(_))));

        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_quantity_zero_equals_remove() {
        let mut a = Cart::new(Currency::USD);
        a.add(template("tpl-1", 1.0)).unwrap();
        a.add(template("tpl-2", 2.0)).unwrap();
        let mut b = a.clone();

        a.update_quantity("tpl-1", 0).unwrap();
        b.remove("tpl-1");
        assert_eq!(a, b);

        a.update_quantity("tpl-2", -4).unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn test_update_quantity_sets_exactly() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("tpl-1", 1.0).with_quantity(4)).unwrap();

        assert!(cart.update_quantity("tpl-1", 2).unwrap());
        assert_eq!(cart.get("tpl-1").unwrap().quantity, 2);
        assert!(!cart.update_quantity("missing", 7).unwrap());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("tpl-1", 1.0)).unwrap();

        assert!(cart.remove("tpl-1"));
        assert!(!cart.remove("tpl-1"));
    }

    #[test]
    fn test_totals_never_drift() {
        let mut cart = Cart::new(Currency::USD);
        let steps: Vec<Box<dyn Fn(&mut Cart)>> = vec![
            Box::new(|c: &mut Cart| {
                c.add(template("a", 0.1)).unwrap();
            }),
            Box::new(|c: &mut Cart| {
                c.add(template("b", 0.2).with_quantity(7)).unwrap();
            }),
            Box::new(|c: &mut Cart| {
                c.add(template("a", 0.1).with_quantity(3)).unwrap();
            }),
            Box::new(|c: &mut Cart| {
                c.update_quantity("b", 2).unwrap();
            }),
            Box::new(|c: &mut Cart| {
                c.remove("a");
            }),
            Box::new(|c: &mut Cart| {
                c.add(template("c", 19.99)).unwrap();
            }),
        ];

        for step in steps {
            step(&mut cart);
            assert_eq!(cart.totals().total_price.amount, recomputed(&cart));
        }
    }

    #[test]
    fn test_overflowing_quantities_are_rejected() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("a", 1.0)).unwrap();
        cart.add(template("b", 1.0)).unwrap();

        cart.update_quantity("a", 3_000_000_000).unwrap();
        let before = cart.clone();

        let err = cart.update_quantity("b", 3_000_000_000).unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
        assert_eq!(cart, before);

        let err = cart.add(template("b", 1.0).with_quantity(u32::MAX)).unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
        assert_eq!(cart, before);

        let totals = cart.totals();
        assert_eq!(totals.total_items, 3_000_000_001);
        assert_eq!(totals.total_price.amount, 300_000_000_100);
    }

    #[test]
    fn test_overflowing_price_is_rejected() {
        let mut cart = Cart::new(Currency::USD);
        let pricey = CartItem::new("x", "X", Price::from_cents(i64::MAX / 2 + 1, Currency::USD), ItemKind::Api);

        cart.add(pricey.clone()).unwrap();
        assert!(matches!(cart.add(pricey), Err(CartError::Validation(_))));
        assert_eq!(cart.get("x").unwrap().quantity, 1);
    }

    #[test]
    fn test_consultation_quantity_stays_one() {
        let mut cart = Cart::new(Currency::USD);
        let id = cart
            .add(CartItem::consultation("General Consultation", Price::new(25.0, Currency::USD)))
            .unwrap();

        assert!(matches!(cart.update_quantity(&id, 3), Err(CartError::Validation(_))));
        assert!(!cart.update_quantity(&id, 1).unwrap());
        assert_eq!(cart.get(&id).unwrap().quantity, 1);

        let bulk = CartItem::consultation("General Consultation", Price::new(25.0, Currency::USD))
            .with_quantity(2);
        assert!(matches!(cart.add(bulk), Err(CartError::Validation(_))));
    }

    #[test]
    fn test_clear_zeroes_totals() {
        let mut cart = Cart::new(Currency::USD);
        cart.add(template("a", 3.0)).unwrap();
        cart.clear();

        let totals = cart.totals();
        assert_eq!(totals.total_items, 0);
        assert_eq!(totals.total_price.amount, 0);
    }
}
