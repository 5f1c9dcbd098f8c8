//! Normalization of cart records returned by the remote service.
//!
//! The service is loose about shapes: the product may arrive as a bare id or
//! as a populated `{ "_id": ..., "name": ... }` document, prices may be
//! numbers or strings, and the list may be bare or wrapped in an object.
//! Everything is funneled through [`normalize_cart`] so the rest of the crate
//! only ever sees canonical [`CartLine`]s.

use std::collections::HashMap;

use marketplace_core::{CartLine, LineKey, ProductId, Quantity, Sku, Variant};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{CartError, Result};

/// Keys under which a wrapped cart response may carry its record list.
const WRAPPER_KEYS: &[&str] = &["items", "cart", "lines", "data"];

/// Product reference as sent by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    /// Bare product id.
    Id(String),
    /// Populated product document.
    Populated(PopulatedProduct),
}

/// Populated product document embedded in a cart record.
#[derive(Debug, Clone, Deserialize)]
pub struct PopulatedProduct {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl ProductRef {
    fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Populated(product) => &product.id,
        }
    }

    const fn populated(&self) -> Option<&PopulatedProduct> {
        match self {
            Self::Id(_) => None,
            Self::Populated(product) => Some(product),
        }
    }
}

/// A cart record exactly as the service sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct CartRecord {
    #[serde(default, alias = "productId")]
    pub product: Option<ProductRef>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub variant: Option<Variant>,
}

impl CartRecord {
    /// Normalize into a canonical cart line.
    ///
    /// Display fields missing on the record fall back to the populated
    /// product document, if any.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidRecord` if the product, SKU, price or a
    /// positive quantity cannot be determined.
    pub fn normalize(self) -> Result<CartLine> {
        let product_ref = self
            .product
            .ok_or_else(|| CartError::InvalidRecord("missing product".to_string()))?;
        let populated = product_ref.populated();

        let product = ProductId::new(product_ref.id())
            .map_err(|e| CartError::InvalidRecord(e.to_string()))?;
        let sku = Sku::new(self.sku.unwrap_or_default())
            .map_err(|e| CartError::InvalidRecord(format!("{e} (product {product})")))?;

        let raw_quantity = self.quantity.ok_or_else(|| {
            CartError::InvalidRecord(format!("missing quantity for {product}/{sku}"))
        })?;
        let quantity = Quantity::new(raw_quantity)
            .map_err(|e| CartError::InvalidRecord(format!("{e} for {product}/{sku}")))?;

        let price = self
            .price
            .or_else(|| populated.and_then(|p| p.price))
            .ok_or_else(|| CartError::InvalidRecord(format!("missing price for {product}/{sku}")))?;
        if price.is_sign_negative() {
            return Err(CartError::InvalidRecord(format!(
                "negative price for {product}/{sku}"
            )));
        }

        let name = self
            .name
            .or_else(|| populated.and_then(|p| p.name.clone()))
            .unwrap_or_default();
        let image = self
            .image
            .or_else(|| populated.and_then(|p| p.image.clone()));
        let variant = self.variant.filter(|v| !v.is_empty());

        Ok(CartLine {
            product,
            sku,
            name,
            image,
            price,
            quantity,
            variant,
        })
    }
}

/// Normalize a full cart response body.
///
/// Malformed records are logged and skipped. Records that repeat a
/// `(product, sku)` pair are folded into the first occurrence so the result
/// never holds two lines with the same identity.
///
/// # Errors
///
/// Returns `CartError::Parse` if the body is neither a list nor an object
/// wrapping one.
pub fn normalize_cart(body: Value) -> Result<Vec<CartLine>> {
    let records = match body {
        Value::Array(records) => records,
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| CartError::Parse("cart object has no record list".to_string()))?,
        Value::Null => Vec::new(),
        other => {
            return Err(CartError::Parse(format!(
                "expected cart list, got {}",
                json_kind(&other)
            )));
        }
    };

    let mut lines: Vec<CartLine> = Vec::with_capacity(records.len());
    let mut positions: HashMap<LineKey, usize> = HashMap::with_capacity(records.len());

    for (index, raw) in records.into_iter().enumerate() {
        let line = match serde_json::from_value::<CartRecord>(raw)
            .map_err(|e| CartError::InvalidRecord(e.to_string()))
            .and_then(CartRecord::normalize)
        {
            Ok(line) => line,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed cart record");
                continue;
            }
        };

        let key = line.key();
        if let Some(existing) = positions.get(&key).and_then(|&i| lines.get_mut(i)) {
            warn!(line = %key, "Cart response repeats a line; merging quantities");
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            positions.insert(key, lines.len());
            lines.push(line);
        }
    }

    Ok(lines)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_bare_product_id() {
        let lines = normalize_cart(json!([
            {"product": "p1", "sku": "s1", "name": "Phone", "price": 699, "quantity": 1}
        ]))
        .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.as_str(), "p1");
        assert_eq!(lines[0].price, Decimal::from(699));
    }

    #[test]
    fn test_nested_product_id_and_fallback_fields() {
        let lines = normalize_cart(json!([{
            "product": {"_id": "p2", "name": "Case", "image": "case.jpg", "price": "69"},
            "sku": "s2",
            "quantity": 2
        }]))
        .unwrap();

        let line = &lines[0];
        assert_eq!(line.product.as_str(), "p2");
        assert_eq!(line.name, "Case");
        assert_eq!(line.image.as_deref(), Some("case.jpg"));
        assert_eq!(line.price, Decimal::from(69));
        assert_eq!(line.quantity.get(), 2);
    }

    #[test]
    fn test_product_id_alias() {
        let lines = normalize_cart(json!([
            {"productId": "p3", "sku": "s3", "price": 10, "quantity": 1}
        ]))
        .unwrap();
        assert_eq!(lines[0].product.as_str(), "p3");
        assert_eq!(lines[0].name, "");
    }

    #[test]
    fn test_wrapped_response() {
        let lines = normalize_cart(json!({
            "items": [{"product": "p1", "sku": "s1", "price": 1, "quantity": 1}]
        }))
        .unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_null_response_is_empty_cart() {
        assert!(normalize_cart(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_shape_is_parse_error() {
        assert!(matches!(
            normalize_cart(json!({"message": "ok"})),
            Err(CartError::Parse(_))
        ));
        assert!(matches!(normalize_cart(json!("cart")), Err(CartError::Parse(_))));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let lines = normalize_cart(json!([
            {"product": "p1", "sku": "s1", "price": 5, "quantity": 0},
            {"product": "p1", "price": 5, "quantity": 1},
            {"sku": "s9", "price": 5, "quantity": 1},
            {"product": "p1", "sku": "s1", "quantity": 1},
            {"product": "p1", "sku": "s1", "price": -5, "quantity": 1},
            "garbage",
            {"product": "p2", "sku": "s2", "price": 5, "quantity": 3}
        ]))
        .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.as_str(), "p2");
    }

    #[test]
    fn test_duplicate_identity_is_merged() {
        let lines = normalize_cart(json!([
            {"product": "p1", "sku": "s1", "price": 5, "quantity": 2},
            {"product": {"_id": "p1"}, "sku": "s1", "price": 5, "quantity": 3},
            {"product": "p1", "sku": "s2", "price": 5, "quantity": 1}
        ]))
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity.get(), 5);
        assert_eq!(lines[1].sku.as_str(), "s2");
    }

    #[test]
    fn test_empty_variant_is_dropped() {
        let lines = normalize_cart(json!([
            {"product": "p1", "sku": "s1", "price": 5, "quantity": 1, "variant": {}},
            {"product": "p1", "sku": "s2", "price": 5, "quantity": 1, "variant": {"color": "Red"}}
        ]))
        .unwrap();

        assert_eq!(lines[0].variant, None);
        assert_eq!(
            lines[1].variant.as_ref().and_then(|v| v.color.as_deref()),
            Some("Red")
        );
    }
}
