//! Remote cart service boundary.
//!
//! # Architecture
//!
//! - [`CartService`] is the seam between the cart store and the network
//! - [`RestCartService`] implements it over REST with `reqwest`
//! - [`payload`] normalizes the service's loosely-shaped cart records into
//!   canonical [`CartLine`]s before anything else sees them
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | fetch | `GET cart/{user}` |
//! | add | `POST cart/{user}/add` |
//! | update quantity | `POST cart/{user}/update` |
//! | remove | `POST cart/{user}/remove` |
//! | clear | `DELETE cart/{user}/clear` |

pub mod payload;
mod rest;

use std::future::Future;

use marketplace_core::{CartLine, ProductId, Quantity, Sku, UserId, Variant};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use rest::RestCartService;

/// Per-user cart CRUD against the remote cart service.
///
/// Every method is a single request; implementations do not retry.
pub trait CartService: Send + Sync + 'static {
    /// Fetch the user's full cart, normalized into cart lines.
    fn fetch_cart(&self, user: &UserId) -> impl Future<Output = Result<Vec<CartLine>>> + Send;

    /// Add units of a line to the user's cart.
    fn add_line(
        &self,
        user: &UserId,
        request: &AddLineRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set the quantity of an existing line.
    fn update_quantity(
        &self,
        user: &UserId,
        request: &UpdateLineRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a line. Removing an absent line is not an error.
    fn remove_line(
        &self,
        user: &UserId,
        request: &RemoveLineRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove every line from the user's cart.
    fn clear_cart(&self, user: &UserId) -> impl Future<Output = Result<()>> + Send;
}

/// Body of `POST cart/{user}/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub image: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub sku: Sku,
    pub variant: Option<Variant>,
}

impl From<&CartLine> for AddLineRequest {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product.clone(),
            quantity: line.quantity,
            image: line.image.clone(),
            price: line.price,
            sku: line.sku.clone(),
            variant: line.variant.clone(),
        }
    }
}

/// Body of `POST cart/{user}/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineRequest {
    pub product_id: ProductId,
    pub sku: Sku,
    pub quantity: Quantity,
}

/// Body of `POST cart/{user}/remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLineRequest {
    pub product_id: ProductId,
    pub sku: Sku,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_add_request_wire_shape() {
        let request = AddLineRequest {
            product_id: ProductId::new("p1").unwrap(),
            quantity: Quantity::new(2).unwrap(),
            image: Some("https://cdn.example.com/p1.jpg".to_string()),
            price: Decimal::new(6999, 2),
            sku: Sku::new("s1").unwrap(),
            variant: Some(Variant {
                size: Some("M".to_string()),
                color: None,
            }),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "productId": "p1",
                "quantity": 2,
                "image": "https://cdn.example.com/p1.jpg",
                "price": 69.99,
                "sku": "s1",
                "variant": {"size": "M"}
            })
        );
    }

    #[test]
    fn test_update_request_wire_shape() {
        let request = UpdateLineRequest {
            product_id: ProductId::new("p1").unwrap(),
            sku: Sku::new("s1").unwrap(),
            quantity: Quantity::ONE,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"productId": "p1", "sku": "s1", "quantity": 1})
        );
    }
}
