//! Local cart state and its pure mutations.
//!
//! [`CartSnapshot`] is what consumers read. The mutation methods are
//! crate-private: only the store applies them, and only after the remote
//! service has confirmed the matching request.

use marketplace_core::{CartLine, CurrencyCode, LineKey, Price, ProductId, Quantity, Sku, UserId};
use rust_decimal::Decimal;

/// Point-in-time view of a user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Owner of `lines`; `None` when no user is signed in.
    pub user: Option<UserId>,
    /// Lines in server order, followed by newly added lines in append order.
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Find a line by identity.
    #[must_use]
    pub fn line(&self, product: &ProductId, sku: &Sku) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(product, sku))
    }

    /// Find a line by key.
    #[must_use]
    pub fn line_by_key(&self, key: &LineKey) -> Option<&CartLine> {
        self.line(&key.product, &key.sku)
    }

    /// Sum of `price × quantity` over every line.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over every line.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity.get())).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total as a priced amount in `currency`.
    #[must_use]
    pub fn subtotal(&self, currency: CurrencyCode) -> Price {
        Price::new(self.total(), currency)
    }

    // =========================================================================
    // Mutations (applied after remote confirmation)
    // =========================================================================

    /// Replace every line with the server's list.
    pub(crate) fn replace(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
    }

    /// Merge a confirmed add: bump an existing line's quantity or append.
    pub(crate) fn merge_add(&mut self, line: CartLine) {
        match self
            .lines
            .iter_mut()
            .find(|l| l.matches(&line.product, &line.sku))
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => self.lines.push(line),
        }
    }

    /// Set a line's quantity exactly. Returns `false` if the line is absent.
    pub(crate) fn set_quantity(&mut self, product: &ProductId, sku: &Sku, quantity: Quantity) -> bool {
        let Some(line) = self.lines.iter_mut().find(|l| l.matches(product, sku)) else {
            return false;
        };
        line.quantity = quantity;
        true
    }

    /// Drop a line. Returns `false` if it was already absent.
    pub(crate) fn remove(&mut self, product: &ProductId, sku: &Sku) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product, sku));
        self.lines.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.lines.clear();
    }

    /// Bind the snapshot to `user`, discarding lines owned by anyone else.
    pub(crate) fn bind(&mut self, user: &UserId) {
        if self.user.as_ref() != Some(user) {
            self.user = Some(user.clone());
            self.lines.clear();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn line(product: &str, sku: &str, price: i64, quantity: i64) -> CartLine {
        CartLine {
            product: ProductId::new(product).unwrap(),
            sku: Sku::new(sku).unwrap(),
            name: format!("{product} {sku}"),
            image: None,
            price: Decimal::from(price),
            quantity: Quantity::new(quantity).unwrap(),
            variant: None,
        }
    }

    fn ids(product: &str, sku: &str) -> (ProductId, Sku) {
        (ProductId::new(product).unwrap(), Sku::new(sku).unwrap())
    }

    #[test]
    fn test_total_and_item_count() {
        let snapshot = CartSnapshot {
            user: None,
            lines: vec![line("p1", "s1", 699, 1), line("p2", "s2", 69, 2)],
        };
        assert_eq!(snapshot.total(), Decimal::from(837));
        assert_eq!(snapshot.item_count(), 3);
        assert_eq!(snapshot.subtotal(CurrencyCode::USD).display(), "$837.00");
    }

    #[test]
    fn test_empty_total_is_zero() {
        let snapshot = CartSnapshot::default();
        assert_eq!(snapshot.total(), Decimal::ZERO);
        assert_eq!(snapshot.item_count(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_merge_add_increments_existing() {
        let mut snapshot = CartSnapshot::default();
        snapshot.merge_add(line("p1", "s1", 10, 2));
        snapshot.merge_add(line("p1", "s1", 10, 3));

        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].quantity.get(), 5);
    }

    #[test]
    fn test_merge_add_appends_new_identity() {
        let mut snapshot = CartSnapshot::default();
        snapshot.merge_add(line("p1", "s1", 10, 1));
        snapshot.merge_add(line("p1", "s2", 10, 1));
        snapshot.merge_add(line("p2", "s1", 10, 1));

        let order: Vec<String> = snapshot.lines.iter().map(|l| l.key().to_string()).collect();
        assert_eq!(order, ["p1/s1", "p1/s2", "p2/s1"]);
    }

    #[test]
    fn test_merge_add_never_duplicates_identity() {
        let mut snapshot = CartSnapshot::default();
        let adds = [
            ("p1", "s1"),
            ("p2", "s1"),
            ("p1", "s1"),
            ("p1", "s2"),
            ("p2", "s1"),
            ("p1", "s1"),
        ];
        for (product, sku) in adds {
            snapshot.merge_add(line(product, sku, 1, 1));
        }

        let keys: HashSet<LineKey> = snapshot.lines.iter().map(CartLine::key).collect();
        assert_eq!(keys.len(), snapshot.lines.len());
        assert_eq!(snapshot.item_count(), 6);
    }

    #[test]
    fn test_set_quantity_replaces() {
        let mut snapshot = CartSnapshot::default();
        snapshot.merge_add(line("p1", "s1", 10, 2));
        let (p, s) = ids("p1", "s1");

        assert!(snapshot.set_quantity(&p, &s, Quantity::ONE));
        assert_eq!(snapshot.line(&p, &s).unwrap().quantity, Quantity::ONE);

        let (missing_p, missing_s) = ids("p9", "s9");
        assert!(!snapshot.set_quantity(&missing_p, &missing_s, Quantity::ONE));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut snapshot = CartSnapshot::default();
        snapshot.merge_add(line("p1", "s1", 10, 1));
        snapshot.merge_add(line("p1", "s2", 10, 1));
        let (p, s) = ids("p1", "s1");

        assert!(snapshot.remove(&p, &s));
        assert!(!snapshot.remove(&p, &s));
        assert_eq!(snapshot.lines.len(), 1);
        assert!(snapshot.line(&p, &s).is_none());
    }

    #[test]
    fn test_bind_discards_other_users_lines() {
        let mut snapshot = CartSnapshot::default();
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();

        snapshot.bind(&alice);
        snapshot.merge_add(line("p1", "s1", 10, 1));
        snapshot.bind(&alice);
        assert_eq!(snapshot.lines.len(), 1);

        snapshot.bind(&bob);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.user, Some(bob));
    }
}
