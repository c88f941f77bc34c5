//! # meridian-db: Storage Layer for Meridian POS
//!
//! SQLite persistence and the transactional engines for the POS.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Meridian POS Data Flow                            │
//! │                                                                         │
//! │  Front-end layer (templates/auth/exports - separate deliverable)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   meridian-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌──────────────┐     │   │
//! │  │   │   Database    │   │ Repositories  │   │   Engine     │     │   │
//! │  │   │   (pool.rs)   │   │ product, sale │   │  checkout /  │     │   │
//! │  │   │ SqlitePool +  │◄──│ customer, ... │   │  refund txns │     │   │
//! │  │   │  migrations   │   └───────────────┘   └──────────────┘     │   │
//! │  │   └───────────────┘                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys on)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`repository`] - Repository implementations
//! - [`engine`] - Checkout/refund transaction engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_core::{CartSessions, PaymentMethod};
//! use meridian_db::{CheckoutRequest, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./pos.db")).await?;
//! let sessions = CartSessions::new();
//!
//! db.checkout()
//!     .add_to_cart(&sessions, "session-1", product_id, 2)
//!     .await?;
//!
//! let outcome = db
//!     .checkout()
//!     .checkout(&sessions, "session-1", CheckoutRequest {
//!         cashier_id,
//!         customer_id: None,
//!         payment_method: Some(PaymentMethod::Cash),
//!         discount_cents: 0,
//!     })
//!     .await?;
//! println!("{}", outcome.receipt.receipt_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{CheckoutEngine, CheckoutOutcome, CheckoutRequest};
pub use error::{DbError, PosError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::activity::ActivityRepository;
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::purchase::{PurchaseLineInput, PurchaseRepository};
pub use repository::sale::SaleRepository;
pub use repository::settings::SettingsRepository;
pub use repository::supplier::{NewSupplier, SupplierRepository};
