//! Core types for the marketplace cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod quantity;

pub use cart::{CartLine, LineKey, Variant};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use quantity::{Quantity, QuantityError};
