//! Marketplace Cart - client-side cart synchronizer.
//!
//! Mirrors a server-held shopping cart for the signed-in user. Pricing,
//! inventory and checkout all live on the backend; this crate keeps a local
//! copy of the cart consistent with it.
//!
//! # Architecture
//!
//! - [`CartStore`] owns the cart lines and is the only writer
//! - [`CartService`] is the remote boundary, implemented over REST by
//!   [`RestCartService`]
//! - [`UserProvider`] supplies the signed-in user; [`AuthSession`] is an
//!   in-process implementation that broadcasts login/logout
//! - [`CartConfig`] loads service settings from the environment
//!
//! # Consistency
//!
//! Local state changes only after the service confirms a request, so a
//! failed call never needs rolling back. Concurrent calls for the same line
//! are not serialized: local merges follow response arrival order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod state;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use error::CartError;
pub use service::{
    AddLineRequest, CartService, RemoveLineRequest, RestCartService, UpdateLineRequest,
};
pub use session::{AuthSession, UserProvider};
pub use state::CartSnapshot;
pub use store::{CartStore, NewCartItem, SkipReason, SyncOutcome};
