//! # Repository Module
//!
//! Database repository implementations for Meridian POS.
//!
//! The Repository pattern keeps all SQL behind a typed API:
//! ```text
//! caller ──► db.products().search("sugar", 20) ──► SQL ──► SQLite
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - catalog CRUD, search, stock adjustments
//! - [`supplier::SupplierRepository`] - supplier CRUD and search
//! - [`sale::SaleRepository`] - sale/receipt lookups (mutations live in
//!   [`crate::engine::CheckoutEngine`])
//! - [`customer::CustomerRepository`] - customers and the credit ledger
//! - [`purchase::PurchaseRepository`] - purchase-order workflow
//! - [`settings::SettingsRepository`] - business settings singleton
//! - [`activity::ActivityRepository`] - append-only audit trail

pub mod activity;
pub mod customer;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod settings;
pub mod supplier;
