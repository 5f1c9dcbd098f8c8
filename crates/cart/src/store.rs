//! Cart state synchronizer.
//!
//! [`CartStore`] mirrors the signed-in user's server-held cart. Every
//! operation is request-then-apply: the remote call goes out first and the
//! equivalent local mutation is applied only once the service confirms it.
//! A failed call leaves local state exactly as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use marketplace_cart::{AuthSession, CartConfig, CartStore, RestCartService};
//!
//! let session = AuthSession::new();
//! let service = RestCartService::new(&CartConfig::from_env()?)?;
//! let store = CartStore::new(service, Arc::new(session.clone()));
//! let _watcher = store.watch_user(session.subscribe());
//!
//! session.login(user_id);
//! store.add_to_cart(item).await?;
//! println!("{}", store.snapshot().total());
//! ```

use std::sync::Arc;

use marketplace_core::{CartLine, ProductId, Quantity, Sku, UserId, Variant};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::service::{AddLineRequest, CartService, RemoveLineRequest, UpdateLineRequest};
use crate::session::UserProvider;
use crate::state::CartSnapshot;

/// What an operation did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote call succeeded and local state was updated.
    Applied,
    /// Nothing was sent or nothing was applied.
    Skipped(SkipReason),
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Why an operation was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No user is signed in; no request was sent.
    NoUser,
    /// Quantity below one; no request was sent.
    InvalidQuantity(i64),
    /// The signed-in user changed while the request was in flight, so the
    /// response was discarded.
    UserChanged,
}

/// Input for [`CartStore::add_to_cart`].
///
/// `quantity` is unvalidated; values below one are rejected by the store
/// without contacting the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub product: ProductId,
    pub sku: Sku,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i64,
    pub variant: Option<Variant>,
}

/// Owner of the client-visible cart.
///
/// Cheap to clone; clones share the same state. Consumers read snapshots
/// via [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe) and
/// never mutate lines directly.
pub struct CartStore<S> {
    inner: Arc<CartStoreInner<S>>,
}

impl<S> Clone for CartStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CartStoreInner<S> {
    service: S,
    users: Arc<dyn UserProvider>,
    state: watch::Sender<CartSnapshot>,
}

impl<S: CartService> CartStore<S> {
    /// Create an empty store backed by `service`, scoped to whoever `users`
    /// reports as signed in.
    #[must_use]
    pub fn new(service: S, users: Arc<dyn UserProvider>) -> Self {
        let (state, _rx) = watch::channel(CartSnapshot::default());
        Self {
            inner: Arc::new(CartStoreInner {
                service,
                users,
                state,
            }),
        }
    }

    /// The underlying service.
    #[must_use]
    pub fn service(&self) -> &S {
        &self.inner.service
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current cart contents for the signed-in user.
    ///
    /// Lines held for anyone else are never returned: after a sign-out or a
    /// user switch the view is empty until the new user's cart is fetched.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.read(CartSnapshot::clone)
    }

    /// Current lines.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.read(|state| state.lines.clone())
    }

    /// Sum of `price × quantity`, recomputed on every call.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.read(CartSnapshot::total)
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.read(CartSnapshot::item_count)
    }

    /// Receive a new snapshot after every applied change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace local lines with the server's cart for the current user.
    ///
    /// On failure the last known lines are kept.
    ///
    /// # Errors
    ///
    /// Returns the service error after logging it.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<SyncOutcome> {
        let Some(user) = self.inner.users.current_user() else {
            debug!("No signed-in user; skipping cart fetch");
            return Ok(SyncOutcome::Skipped(SkipReason::NoUser));
        };

        self.rebind(&user);

        let lines = match self.inner.service.fetch_cart(&user).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(user = %user, error = %e, "Cart fetch failed; keeping last known lines");
                return Err(e);
            }
        };

        let count = lines.len();
        let outcome = self.apply(&user, |state| state.replace(lines));
        if outcome.is_applied() {
            info!(user = %user, lines = count, "Cart synchronized");
        }
        Ok(outcome)
    }

    /// Add units of a product variant, merging into an existing line with
    /// the same product and SKU.
    ///
    /// # Errors
    ///
    /// Returns the service error after logging it; local state is unchanged.
    #[instrument(skip(self, item), fields(product = %item.product, sku = %item.sku, quantity = item.quantity))]
    pub async fn add_to_cart(&self, item: NewCartItem) -> Result<SyncOutcome> {
        let Some(user) = self.inner.users.current_user() else {
            debug!("No signed-in user; ignoring add");
            return Ok(SyncOutcome::Skipped(SkipReason::NoUser));
        };
        let Ok(quantity) = Quantity::new(item.quantity) else {
            debug!("Quantity below one; ignoring add");
            return Ok(SyncOutcome::Skipped(SkipReason::InvalidQuantity(item.quantity)));
        };

        let line = CartLine {
            product: item.product,
            sku: item.sku,
            name: item.name,
            image: item.image,
            price: item.price,
            quantity,
            variant: item.variant.filter(|v| !v.is_empty()),
        };

        if let Err(e) = self
            .inner
            .service
            .add_line(&user, &AddLineRequest::from(&line))
            .await
        {
            warn!(user = %user, error = %e, "Add to cart failed");
            return Err(e);
        }

        Ok(self.apply(&user, |state| state.merge_add(line)))
    }

    /// Set a line's quantity exactly.
    ///
    /// Quantities below one are ignored without contacting the service; use
    /// [`remove_from_cart`](Self::remove_from_cart) to delete a line.
    ///
    /// # Errors
    ///
    /// Returns the service error after logging it; local state is unchanged.
    #[instrument(skip(self), fields(product = %product, sku = %sku))]
    pub async fn update_quantity(
        &self,
        product: &ProductId,
        sku: &Sku,
        quantity: i64,
    ) -> Result<SyncOutcome> {
        let Some(user) = self.inner.users.current_user() else {
            debug!("No signed-in user; ignoring quantity update");
            return Ok(SyncOutcome::Skipped(SkipReason::NoUser));
        };
        let Ok(quantity_checked) = Quantity::new(quantity) else {
            debug!("Quantity below one; ignoring update");
            return Ok(SyncOutcome::Skipped(SkipReason::InvalidQuantity(quantity)));
        };

        let request = UpdateLineRequest {
            product_id: product.clone(),
            sku: sku.clone(),
            quantity: quantity_checked,
        };
        if let Err(e) = self.inner.service.update_quantity(&user, &request).await {
            warn!(user = %user, error = %e, "Quantity update failed");
            return Err(e);
        }

        Ok(self.apply(&user, |state| {
            if !state.set_quantity(product, sku, quantity_checked) {
                debug!("Updated line is not in the local cart");
            }
        }))
    }

    /// Remove a line. Removing an absent line succeeds.
    ///
    /// # Errors
    ///
    /// Returns the service error after logging it; local state is unchanged.
    #[instrument(skip(self), fields(product = %product, sku = %sku))]
    pub async fn remove_from_cart(&self, product: &ProductId, sku: &Sku) -> Result<SyncOutcome> {
        let Some(user) = self.inner.users.current_user() else {
            debug!("No signed-in user; ignoring remove");
            return Ok(SyncOutcome::Skipped(SkipReason::NoUser));
        };

        let request = RemoveLineRequest {
            product_id: product.clone(),
            sku: sku.clone(),
        };
        if let Err(e) = self.inner.service.remove_line(&user, &request).await {
            warn!(user = %user, error = %e, "Remove from cart failed");
            return Err(e);
        }

        Ok(self.apply(&user, |state| {
            state.remove(product, sku);
        }))
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns the service error after logging it; local state is unchanged.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<SyncOutcome> {
        let Some(user) = self.inner.users.current_user() else {
            debug!("No signed-in user; ignoring clear");
            return Ok(SyncOutcome::Skipped(SkipReason::NoUser));
        };

        if let Err(e) = self.inner.service.clear_cart(&user).await {
            warn!(user = %user, error = %e, "Clear cart failed");
            return Err(e);
        }

        Ok(self.apply(&user, CartSnapshot::clear))
    }

    /// Discard local lines, e.g. after sign-out.
    pub fn reset(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            if state.user.is_none() && state.lines.is_empty() {
                return false;
            }
            *state = CartSnapshot::default();
            true
        });
        if changed {
            info!("Cart discarded");
        }
    }

    /// Follow identity changes: fetch on sign-in or user switch, discard on
    /// sign-out. The task ends when the sender side is dropped.
    pub fn watch_user(&self, mut changes: watch::Receiver<Option<UserId>>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                let user = changes.borrow_and_update().clone();
                match user {
                    // Errors are logged by fetch; the last known lines stay.
                    Some(_) => {
                        let _ = store.fetch().await;
                    }
                    None => store.reset(),
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Read the state as seen by the signed-in user.
    fn read<T>(&self, f: impl FnOnce(&CartSnapshot) -> T) -> T {
        let current = self.inner.users.current_user();
        let state = self.inner.state.borrow();
        if state.user == current {
            f(&*state)
        } else {
            f(&CartSnapshot {
                user: current,
                lines: Vec::new(),
            })
        }
    }

    /// Drop lines owned by a previous user before fetching for `user`.
    fn rebind(&self, user: &UserId) {
        let switched = self.inner.state.send_if_modified(|state| {
            if state.user.as_ref() == Some(user) {
                return false;
            }
            state.bind(user);
            true
        });
        if switched {
            debug!(user = %user, "Discarded cart held for previous user");
        }
    }

    /// Apply a confirmed mutation if `user` is still the signed-in user.
    fn apply(&self, user: &UserId, mutate: impl FnOnce(&mut CartSnapshot)) -> SyncOutcome {
        if self.inner.users.current_user().as_ref() != Some(user) {
            debug!(user = %user, "Signed-in user changed during request; discarding response");
            return SyncOutcome::Skipped(SkipReason::UserChanged);
        }

        self.inner.state.send_modify(|state| {
            state.bind(user);
            mutate(state);
        });
        SyncOutcome::Applied
    }
}
