//! Marketplace Core - Shared types library.
//!
//! This crate provides common types used across all marketplace components:
//! - `cart` - Cart state synchronizer and remote cart service client
//! - `cli` - Command-line consumer of the cart synchronizer
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype identifiers, quantities, prices and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
