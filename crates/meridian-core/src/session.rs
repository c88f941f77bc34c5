//! # Cart Session Registry
//!
//! Per-session cart storage with hold/resume support.
//!
//! ## Session Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CartSessions                                      │
//! │                                                                         │
//! │  session "9f2c.."  ──►  active Cart                                     │
//! │                         holds: { "1c9a40bf" → HeldCart,                 │
//! │                                  "77e01d22" → HeldCart }                │
//! │                                                                         │
//! │  session "b811.."  ──►  active Cart                                     │
//! │                         holds: { }                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is an explicit store keyed by an opaque session id supplied
//! by the authentication layer. Held carts are timestamped and expire after
//! a TTL via [`CartSessions::purge_expired`]; nothing lingers forever the
//! way raw session keys would.
//!
//! Carts are never shared across sessions, and no cart state is persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};

/// Default lifetime of a held cart before `purge_expired` drops it.
pub const DEFAULT_HOLD_TTL_HOURS: i64 = 12;

/// Length of the generated opaque hold identifier.
const HOLD_ID_LEN: usize = 8;

// =============================================================================
// Held Cart
// =============================================================================

/// A parked cart awaiting resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeldCart {
    pub cart: Cart,
    pub held_at: DateTime<Utc>,
}

/// Listing entry for a session's holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeldCartSummary {
    pub hold_id: String,
    pub line_count: usize,
    pub subtotal_cents: i64,
    pub held_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionEntry {
    active: Cart,
    holds: HashMap<String, HeldCart>,
}

// =============================================================================
// Cart Sessions
// =============================================================================

/// Registry of per-session carts and their holds.
///
/// Shared behind a Mutex: callers run short closures against the cart they
/// own, one at a time. Sessions are created empty on first touch.
#[derive(Debug)]
pub struct CartSessions {
    inner: Mutex<HashMap<String, SessionEntry>>,
    hold_ttl: Duration,
}

impl CartSessions {
    /// Creates a registry with the default hold TTL.
    pub fn new() -> Self {
        Self::with_hold_ttl(Duration::hours(DEFAULT_HOLD_TTL_HOURS))
    }

    /// Creates a registry with a custom hold TTL.
    pub fn with_hold_ttl(hold_ttl: Duration) -> Self {
        CartSessions {
            inner: Mutex::new(HashMap::new()),
            hold_ttl,
        }
    }

    /// Runs a closure with read access to a session's active cart.
    pub fn with_cart<F, R>(&self, session_id: &str, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let entry = inner.entry(session_id.to_string()).or_default();
        f(&entry.active)
    }

    /// Runs a closure with write access to a session's active cart.
    pub fn with_cart_mut<F, R>(&self, session_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let entry = inner.entry(session_id.to_string()).or_default();
        f(&mut entry.active)
    }

    /// Returns a snapshot (clone) of the session's active cart.
    pub fn snapshot(&self, session_id: &str) -> Cart {
        self.with_cart(session_id, |c| c.clone())
    }

    /// Clears the session's active cart.
    pub fn clear(&self, session_id: &str) {
        self.with_cart_mut(session_id, |c| c.clear());
    }

    /// Parks the active cart under a fresh opaque hold id and starts an
    /// empty cart.
    ///
    /// Fails with [`CoreError::EmptyCart`] when there is nothing to hold.
    pub fn hold(&self, session_id: &str) -> CoreResult<String> {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let entry = inner.entry(session_id.to_string()).or_default();

        if entry.active.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        let hold_id = generate_hold_id();
        // take() leaves a fresh empty cart as the active one
        let parked = std::mem::take(&mut entry.active);
        entry.holds.insert(
            hold_id.clone(),
            HeldCart {
                cart: parked,
                held_at: Utc::now(),
            },
        );

        Ok(hold_id)
    }

    /// Swaps a held cart back in as the active cart, consuming the hold.
    ///
    /// Whatever was in the active cart is discarded, matching the resume
    /// semantics cashiers expect ("bring that sale back"). Fails with
    /// [`CoreError::HoldNotFound`] for unknown identifiers.
    pub fn resume(&self, session_id: &str, hold_id: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let entry = inner.entry(session_id.to_string()).or_default();

        match entry.holds.remove(hold_id) {
            Some(held) => {
                entry.active = held.cart;
                Ok(())
            }
            None => Err(CoreError::HoldNotFound(hold_id.to_string())),
        }
    }

    /// Lists a session's held carts, newest first.
    pub fn held(&self, session_id: &str) -> Vec<HeldCartSummary> {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let entry = inner.entry(session_id.to_string()).or_default();

        let mut holds: Vec<HeldCartSummary> = entry
            .holds
            .iter()
            .map(|(hold_id, held)| HeldCartSummary {
                hold_id: hold_id.clone(),
                line_count: held.cart.line_count(),
                subtotal_cents: held.cart.subtotal_cents(),
                held_at: held.held_at,
            })
            .collect();
        holds.sort_by(|a, b| b.held_at.cmp(&a.held_at));
        holds
    }

    /// Drops all of a session's held carts, returning how many were removed.
    pub fn clear_held(&self, session_id: &str) -> usize {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        match inner.get_mut(session_id) {
            Some(entry) => {
                let count = entry.holds.len();
                entry.holds.clear();
                count
            }
            None => 0,
        }
    }

    /// Drops held carts older than the TTL across all sessions, returning
    /// how many were removed. Intended to be called periodically by the
    /// hosting layer.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        let cutoff = now - self.hold_ttl;

        let mut purged = 0;
        for entry in inner.values_mut() {
            let before = entry.holds.len();
            entry.holds.retain(|_, held| held.held_at > cutoff);
            purged += before - entry.holds.len();
        }
        purged
    }

    /// Removes a session outright (logout / session expiry).
    pub fn remove_session(&self, session_id: &str) {
        let mut inner = self.inner.lock().expect("cart registry mutex poisoned");
        inner.remove(session_id);
    }
}

impl Default for CartSessions {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a short opaque hold identifier (8 hex chars of a UUID v4).
fn generate_hold_id() -> String {
    Uuid::new_v4().simple().to_string()[..HOLD_ID_LEN].to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Product;

    fn test_product(id: i64, price_cents: i64, stock: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            sku: format!("SKU-{}", id),
            barcode: None,
            category: None,
            supplier_id: None,
            price_cents,
            cost_price_cents: None,
            stock_quantity: stock,
            low_stock_threshold: 5,
            expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn add_one(sessions: &CartSessions, session_id: &str) {
        let product = test_product(1, 1000, 10);
        sessions
            .with_cart_mut(session_id, |c| c.add_line(&product, 2))
            .unwrap();
    }

    #[test]
    fn test_sessions_are_isolated() {
        let sessions = CartSessions::new();
        add_one(&sessions, "alice");

        assert_eq!(sessions.snapshot("alice").line_count(), 1);
        assert!(sessions.snapshot("bob").is_empty());
    }

    #[test]
    fn test_hold_and_resume_round_trip() {
        let sessions = CartSessions::new();
        add_one(&sessions, "s1");

        let hold_id = sessions.hold("s1").unwrap();
        assert_eq!(hold_id.len(), HOLD_ID_LEN);
        assert!(sessions.snapshot("s1").is_empty());

        sessions.resume("s1", &hold_id).unwrap();
        assert_eq!(sessions.snapshot("s1").total_quantity(), 2);

        // Hold is consumed
        let err = sessions.resume("s1", &hold_id).unwrap_err();
        assert!(matches!(err, CoreError::HoldNotFound(_)));
    }

    #[test]
    fn test_hold_empty_cart_rejected() {
        let sessions = CartSessions::new();
        let err = sessions.hold("s1").unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));
    }

    #[test]
    fn test_resume_unknown_hold() {
        let sessions = CartSessions::new();
        let err = sessions.resume("s1", "deadbeef").unwrap_err();
        assert!(matches!(err, CoreError::HoldNotFound(_)));
    }

    #[test]
    fn test_held_listing_and_clear() {
        let sessions = CartSessions::new();
        add_one(&sessions, "s1");
        sessions.hold("s1").unwrap();
        add_one(&sessions, "s1");
        sessions.hold("s1").unwrap();

        let held = sessions.held("s1");
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].subtotal_cents, 2000);

        assert_eq!(sessions.clear_held("s1"), 2);
        assert!(sessions.held("s1").is_empty());
    }

    #[test]
    fn test_purge_expired_holds() {
        let sessions = CartSessions::with_hold_ttl(Duration::hours(1));
        add_one(&sessions, "s1");
        sessions.hold("s1").unwrap();

        // Within TTL: nothing purged
        assert_eq!(sessions.purge_expired(Utc::now()), 0);
        assert_eq!(sessions.held("s1").len(), 1);

        // Past TTL: hold is dropped
        assert_eq!(sessions.purge_expired(Utc::now() + Duration::hours(2)), 1);
        assert!(sessions.held("s1").is_empty());
    }
}
