//! Cart commands.
//!
//! Every command signs the given user in, pulls the server cart so local
//! merges start from the same state, applies its operation, and prints the
//! resulting cart.
//!
//! # Environment Variables
//!
//! - `CART_API_BASE_URL` - Remote cart service (required)
//! - `CART_API_TOKEN` - Bearer token (optional)

use std::sync::Arc;

use marketplace_cart::{
    AuthSession, CartConfig, CartError, CartSnapshot, CartStore, ConfigError, NewCartItem,
    RestCartService, SkipReason, SyncOutcome,
};
use marketplace_core::{CurrencyCode, Price, ProductId, Sku, UserId, Variant};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The cart service call failed.
    #[error("Cart service error: {0}")]
    Cart(#[from] CartError),

    /// No `--user` given and `CART_USER` unset.
    #[error("No user given; pass --user or set CART_USER")]
    NoUser,

    /// The operation was not performed.
    #[error("Nothing changed: {0}")]
    Skipped(String),

    /// Output could not be encoded.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Line to add, as parsed from the command line.
pub struct AddLine {
    pub product: ProductId,
    pub sku: Sku,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// A signed-in store with the server cart already loaded.
pub struct CartContext {
    store: CartStore<RestCartService>,
    currency: CurrencyCode,
    json: bool,
}

impl CartContext {
    /// Load configuration, sign `user` in and fetch their cart.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid, no user is given, or
    /// the initial fetch fails.
    pub async fn connect(user: Option<UserId>, json: bool) -> Result<Self, CommandError> {
        let user = user.ok_or(CommandError::NoUser)?;
        let config = CartConfig::from_env()?;
        tracing::debug!(config = ?config, "Loaded cart configuration");

        let service = RestCartService::new(&config)?;
        let session = AuthSession::signed_in(user);
        let store = CartStore::new(service, Arc::new(session));
        store.fetch().await?;

        Ok(Self {
            store,
            currency: config.currency,
            json,
        })
    }

    /// Print the cart.
    pub fn show(&self) -> Result<(), CommandError> {
        self.print(&self.store.snapshot())
    }

    /// Add units of a line, merging with an existing line.
    pub async fn add(&self, line: AddLine) -> Result<(), CommandError> {
        let variant = Variant {
            size: line.size,
            color: line.color,
        };
        let outcome = self
            .store
            .add_to_cart(NewCartItem {
                product: line.product,
                sku: line.sku,
                name: line.name,
                image: line.image,
                price: line.price,
                quantity: line.quantity,
                variant: Some(variant),
            })
            .await?;
        self.finish(outcome)
    }

    /// Set a line's quantity exactly.
    pub async fn update(&self, product: &ProductId, sku: &Sku, quantity: i64) -> Result<(), CommandError> {
        let outcome = self.store.update_quantity(product, sku, quantity).await?;
        self.finish(outcome)
    }

    /// Remove a line.
    pub async fn remove(&self, product: &ProductId, sku: &Sku) -> Result<(), CommandError> {
        let outcome = self.store.remove_from_cart(product, sku).await?;
        self.finish(outcome)
    }

    /// Remove every line.
    pub async fn clear(&self) -> Result<(), CommandError> {
        let outcome = self.store.clear_cart().await?;
        self.finish(outcome)
    }

    fn finish(&self, outcome: SyncOutcome) -> Result<(), CommandError> {
        match outcome {
            SyncOutcome::Applied => self.print(&self.store.snapshot()),
            SyncOutcome::Skipped(reason) => Err(CommandError::Skipped(describe_skip(reason))),
        }
    }

    #[allow(clippy::print_stdout)]
    fn print(&self, snapshot: &CartSnapshot) -> Result<(), CommandError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot.lines)?);
        } else {
            println!("{}", render_table(snapshot, self.currency));
        }
        Ok(())
    }
}

fn describe_skip(reason: SkipReason) -> String {
    match reason {
        SkipReason::NoUser => "no signed-in user".to_string(),
        SkipReason::InvalidQuantity(q) => {
            format!("quantity must be at least 1 (got {q}); use `remove` to delete a line")
        }
        SkipReason::UserChanged => "user changed during the request".to_string(),
    }
}

/// Render the cart as a plain-text table with a subtotal row.
fn render_table(snapshot: &CartSnapshot, currency: CurrencyCode) -> String {
    if snapshot.is_empty() {
        return "Cart is empty".to_string();
    }

    let mut out = String::new();
    for line in &snapshot.lines {
        let variant = line
            .variant
            .as_ref()
            .and_then(Variant::label)
            .map(|label| format!(" ({label})"))
            .unwrap_or_default();
        let unit = Price::new(line.price, currency);
        let total = Price::new(line.line_total(), currency);
        out.push_str(&format!(
            "{:>3} x {}{} [{}/{}] @ {} = {}\n",
            line.quantity, line.name, variant, line.product, line.sku, unit, total
        ));
    }
    out.push_str(&format!(
        "{} items, subtotal {}",
        snapshot.item_count(),
        snapshot.subtotal(currency)
    ));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketplace_core::{CartLine, Quantity};

    use super::*;

    #[test]
    fn test_render_empty_cart() {
        let rendered = render_table(&CartSnapshot::default(), CurrencyCode::USD);
        assert_eq!(rendered, "Cart is empty");
    }

    #[test]
    fn test_render_table_with_subtotal() {
        let snapshot = CartSnapshot {
            user: Some(UserId::new("u1").unwrap()),
            lines: vec![
                CartLine {
                    product: ProductId::new("p1").unwrap(),
                    sku: Sku::new("s1").unwrap(),
                    name: "Phone".to_string(),
                    image: None,
                    price: Decimal::from(699),
                    quantity: Quantity::ONE,
                    variant: None,
                },
                CartLine {
                    product: ProductId::new("p2").unwrap(),
                    sku: Sku::new("s2").unwrap(),
                    name: "Case".to_string(),
                    image: None,
                    price: Decimal::from(69),
                    quantity: Quantity::new(2).unwrap(),
                    variant: Some(Variant {
                        size: None,
                        color: Some("Red".to_string()),
                    }),
                },
            ],
        };

        let rendered = render_table(&snapshot, CurrencyCode::USD);

        assert!(rendered.contains("  1 x Phone [p1/s1] @ $699.00 = $699.00"));
        assert!(rendered.contains("  2 x Case (Red) [p2/s2] @ $69.00 = $138.00"));
        assert!(rendered.ends_with("3 items, subtotal $837.00"));
    }

    #[test]
    fn test_describe_invalid_quantity() {
        assert!(describe_skip(SkipReason::InvalidQuantity(0)).contains("use `remove`"));
    }
}
