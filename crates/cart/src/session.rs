//! Authenticated-user access for the cart store.
//!
//! The store never reaches for a global session: it is handed a
//! [`UserProvider`] at construction and asks it for the current user before
//! every operation.

use std::sync::Arc;

use marketplace_core::UserId;
use tokio::sync::watch;
use tracing::info;

/// Source of the currently authenticated user.
pub trait UserProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in.
    fn current_user(&self) -> Option<UserId>;
}

impl<F> UserProvider for F
where
    F: Fn() -> Option<UserId> + Send + Sync,
{
    fn current_user(&self) -> Option<UserId> {
        self()
    }
}

/// In-process login state that broadcasts identity changes.
///
/// Cheap to clone; clones share the same state. Pair it with
/// [`CartStore::watch_user`](crate::CartStore::watch_user) to re-fetch the
/// cart on login and discard it on logout.
#[derive(Clone)]
pub struct AuthSession {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl AuthSession {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Create a session already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        let session = Self::new();
        session.tx.send_replace(Some(user));
        session
    }

    /// Sign in as `user`. Subscribers are notified only if the user changed.
    pub fn login(&self, user: UserId) {
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user.clone());
            true
        });
        if changed {
            info!(user = %user, "User signed in");
        }
    }

    /// Sign out. Subscribers are notified only if someone was signed in.
    pub fn logout(&self) {
        let previous = self.tx.send_if_modified(|current| current.take().is_some());
        if previous {
            info!("User signed out");
        }
    }

    /// Receive identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UserProvider for AuthSession {
    fn current_user(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_login_and_logout() {
        let session = AuthSession::new();
        assert_eq!(session.current_user(), None);

        session.login(user("u1"));
        assert_eq!(session.current_user(), Some(user("u1")));

        session.logout();
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_repeated_login_does_not_notify() {
        let session = AuthSession::signed_in(user("u1"));
        let rx = session.subscribe();

        session.login(user("u1"));
        assert!(!rx.has_changed().unwrap());

        session.login(user("u2"));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_logout_when_signed_out_does_not_notify() {
        let session = AuthSession::new();
        let rx = session.subscribe();
        session.logout();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_closure_provider() {
        let provider = || Some(user("closure"));
        assert_eq!(provider.current_user(), Some(user("closure")));
    }
}
