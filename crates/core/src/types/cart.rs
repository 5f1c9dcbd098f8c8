//! Cart line types.
//!
//! A [`CartLine`] is one entry in a user's cart. Its identity is the
//! `(product, sku)` pair captured in [`LineKey`]; every other field is a
//! display snapshot taken when the line was added.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, Sku};
use super::quantity::Quantity;

/// Optional size/color descriptor attached to a cart line.
///
/// Purely informational: two lines with the same product and SKU are the
/// same line regardless of variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Variant {
    /// Returns `true` if neither size nor color is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size.is_none() && self.color.is_none()
    }

    /// Human-readable label, e.g. `"M / Red"`.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match (&self.size, &self.color) {
            (Some(size), Some(color)) => Some(format!("{size} / {color}")),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        }
    }
}

/// Composite identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub product: ProductId,
    pub sku: Sku,
}

impl LineKey {
    /// Create a new line key.
    #[must_use]
    pub const fn new(product: ProductId, sku: Sku) -> Self {
        Self { product, sku }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product, self.sku)
    }
}

/// One entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog item identifier.
    pub product: ProductId,
    /// Stock-keeping identifier, unique within the product's variants.
    pub sku: Sku,
    /// Display name captured at add time.
    pub name: String,
    /// Image URL captured at add time.
    pub image: Option<String>,
    /// Unit price captured at add time.
    pub price: Decimal,
    /// Number of units, always at least one.
    pub quantity: Quantity,
    /// Optional size/color descriptor.
    pub variant: Option<Variant>,
}

impl CartLine {
    /// Identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.clone(), self.sku.clone())
    }

    /// Returns `true` if this line has the given identity.
    #[must_use]
    pub fn matches(&self, product: &ProductId, sku: &Sku) -> bool {
        &self.product == product && &self.sku == sku
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity.get())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i64) -> CartLine {
        CartLine {
            product: ProductId::new("p1").unwrap(),
            sku: Sku::new("s1").unwrap(),
            name: "Phone".to_string(),
            image: None,
            price: Decimal::from(price),
            quantity: Quantity::new(quantity).unwrap(),
            variant: None,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(69, 2).line_total(), Decimal::from(138));
    }

    #[test]
    fn test_matches_requires_both_fields() {
        let l = line(1, 1);
        let p1 = ProductId::new("p1").unwrap();
        let s1 = Sku::new("s1").unwrap();
        let s2 = Sku::new("s2").unwrap();
        assert!(l.matches(&p1, &s1));
        assert!(!l.matches(&p1, &s2));
        assert_eq!(l.key().to_string(), "p1/s1");
    }

    #[test]
    fn test_variant_label() {
        let v = Variant {
            size: Some("M".to_string()),
            color: Some("Red".to_string()),
        };
        assert_eq!(v.label().as_deref(), Some("M / Red"));
        assert!(Variant::default().is_empty());
        assert_eq!(Variant::default().label(), None);
    }
}
