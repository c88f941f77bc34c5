//! # meridian-core: Pure Business Logic for Meridian POS
//!
//! This crate is the heart of Meridian POS. It contains the business rules
//! of the point of sale as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Web front end (templates, auth, exports)             │   │
//! │  │        — separate deliverable, consumes these crates —          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ meridian-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  session  │   │   │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │ hold/     │   │   │
//! │  │   │   Sale    │  │  (cents)  │  │ CartLine  │  │  resume   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                meridian-db (Storage + Engines)                  │   │
//! │  │        SQLite repositories, checkout/refund transactions        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Customer, PurchaseOrder, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - The pending sale and its line math
//! - [`session`] - Per-session cart registry with hold/resume and expiry
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic; same input, same output
//! 2. **No I/O**: database, network, file system access is forbidden here
//! 3. **Integer Money**: all monetary values are minor units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use session::{CartSessions, HeldCart, HeldCartSummary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// Keeps a runaway cart from turning into an unbounded transaction; large
/// institutional orders go through purchase orders instead.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// Catches fat-finger quantities (1000 instead of 10) before they reach
/// checkout.
pub const MAX_LINE_QUANTITY: i64 = 999;
