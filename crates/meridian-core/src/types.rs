//! # Domain Types
//!
//! Core domain types used throughout Meridian POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                 Sales                    Partners              │
//! │  ───────                 ─────                    ────────              │
//! │  Product                 Sale ── SaleItem         Customer              │
//! │  StockAdjustment         Receipt                  CreditTransaction     │
//! │  Supplier                SaleStatus               PurchaseOrder         │
//! │                          PaymentMethod            PurchaseItem          │
//! │                                                                         │
//! │  BusinessSettings / ActivityEntry cut across all of the above.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities use SQLite integer row ids. Monetary fields are raw `*_cents`
//! integers with [`Money`] accessor methods; the raw field is what the
//! database row carries, the accessor is what calculations use.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Stock is mutated only through defined operations: checkout, refund,
/// stock adjustment, and purchase-order receipt. It never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,

    /// Display name shown to cashier and on receipt lines.
    pub name: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, ...), unique when present.
    pub barcode: Option<String>,

    /// Free-form category label used for catalog filtering.
    pub category: Option<String>,

    /// Supplier this product is usually ordered from.
    pub supplier_id: Option<i64>,

    /// Selling price in minor units.
    pub price_cents: i64,

    /// Acquisition cost in minor units; overwritten by purchase receipts.
    pub cost_price_cents: Option<i64>,

    /// Current stock level. Invariant: >= 0.
    pub stock_quantity: i64,

    /// Stock level at or below which the product counts as low stock.
    pub low_stock_threshold: i64,

    /// Optional shelf-life cutoff.
    pub expiry_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost price as Money, if known.
    #[inline]
    pub fn cost_price(&self) -> Option<Money> {
        self.cost_price_cents.map(Money::from_cents)
    }

    /// Checks whether current stock covers the requested quantity.
    #[inline]
    pub fn can_cover(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }

    /// Checks whether the product is at or below its low-stock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier products are purchased from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// The only legal transition is `Completed` → `Refunded`. `OnHold` exists in
/// the status domain for schema compatibility; parked sales live in the cart
/// session registry and are not persisted as sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and finalized.
    Completed,
    /// Reserved for parked sales.
    OnHold,
    /// Sale was reversed; stock has been restored.
    Refunded,
}

impl SaleStatus {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::OnHold => "on_hold",
            SaleStatus::Refunded => "refunded",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Mobile money transfer.
    MobileMoney,
    /// Mixed tender across multiple methods.
    Split,
}

impl PaymentMethod {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Split => "split",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A finalized sale transaction.
///
/// Totals obey: `total_cents = subtotal_cents - discount_cents`, with the
/// discount clamped into `[0, subtotal]` at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,

    /// Cashier who processed the sale. Identity comes from the auth layer.
    pub cashier_id: i64,

    /// Customer the sale is attributed to, for credit sales.
    pub customer_id: Option<i64>,

    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub payment_method: PaymentMethod,
    pub status: SaleStatus,

    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the applied discount as Money.
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Snapshot pattern: quantity and unit price are frozen at checkout so the
/// sale history survives later product edits. Rows are immutable and are
/// cascade-deleted with their sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price in minor units at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Line total: unit_price × quantity.
    pub total_price_cents: i64,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// Receipt record, 1:1 with a sale.
///
/// `receipt_number` is `R` + the sale id zero-padded to 6 digits
/// (`R000042`). Rendering to paper/PDF/email is the display layer's job;
/// this row is the durable reference it renders from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Receipt {
    pub id: i64,
    pub sale_id: i64,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
}

/// Formats a receipt number for a sale id: `R` + zero-padded to 6 digits.
#[inline]
pub fn receipt_number_for(sale_id: i64) -> String {
    format!("R{:06}", sale_id)
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with an optional store-credit account.
///
/// `credit_balance_cents` is the amount the customer owes the store; it is
/// increased by credit postings and decreased by recorded payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub credit_balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn credit_balance(&self) -> Money {
        Money::from_cents(self.credit_balance_cents)
    }
}

// =============================================================================
// Credit Transactions
// =============================================================================

/// Direction of a credit-ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CreditEntryType {
    /// Credit extended to the customer (balance goes up).
    Credit,
    /// Payment received from the customer (balance goes down).
    Payment,
}

impl CreditEntryType {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditEntryType::Credit => "credit",
            CreditEntryType::Payment => "payment",
        }
    }
}

/// One posting in a customer's credit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CreditTransaction {
    pub id: i64,
    pub customer_id: i64,
    /// Sale the posting relates to, when it originated from a credit sale.
    pub sale_id: Option<i64>,
    pub amount_cents: i64,
    pub entry_type: CreditEntryType,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Purchase Orders
// =============================================================================

/// Lifecycle of a supplier purchase order.
///
/// ```text
/// pending ──► received   (terminal; stock and cost prices applied)
///    │
///    └─────► cancelled   (terminal; no side effects)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A supplier order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: i64,
    pub supplier_id: i64,
    pub status: PurchaseOrderStatus,
    /// Sum of item subtotals in minor units.
    pub total_cost_cents: i64,
    pub created_by: i64,
    pub order_date: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Returns the order total as Money.
    #[inline]
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.total_cost_cents)
    }
}

/// A line on a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: i64,
    pub purchase_order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub cost_price_cents: i64,
    /// quantity × cost_price.
    pub subtotal_cents: i64,
}

// =============================================================================
// Stock Adjustments
// =============================================================================

/// Kind of manual stock correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Stock written off; subtracts the quantity.
    Damage,
    /// Goods coming back into stock; adds the quantity.
    Return,
    /// Free-form correction; applies the signed quantity directly.
    Manual,
}

impl AdjustmentType {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Damage => "damage",
            AdjustmentType::Return => "return",
            AdjustmentType::Manual => "manual",
        }
    }
}

/// A recorded stock correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: i64,
    pub product_id: i64,
    pub adjustment_type: AdjustmentType,
    /// Units adjusted; signed for `Manual`, positive otherwise.
    pub quantity: i64,
    pub note: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Business Settings
// =============================================================================

/// Store-wide configuration, a single row created on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BusinessSettings {
    pub id: i64,
    pub business_name: String,
    /// ISO-ish currency code used by the display layer ("GHS", "USD", ...).
    pub currency: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub contact_email: Option<String>,
    /// Whether the low-stock listing should feed alerts.
    pub low_stock_alerts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Activity Log
// =============================================================================

/// Append-only audit entry. The engines write one inside the same
/// transaction as the mutation it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_number_format() {
        assert_eq!(receipt_number_for(1), "R000001");
        assert_eq!(receipt_number_for(42), "R000042");
        assert_eq!(receipt_number_for(123456), "R123456");
        // Ids beyond six digits keep their full width
        assert_eq!(receipt_number_for(1234567), "R1234567");
    }

    #[test]
    fn test_enum_wire_format() {
        // The serde names double as the database TEXT representation;
        // the front-end layer depends on these exact strings.
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MobileMoney).unwrap(),
            "\"mobile_money\""
        );
        assert_eq!(
            serde_json::to_string(&SaleStatus::OnHold).unwrap(),
            "\"on_hold\""
        );
        assert_eq!(
            serde_json::to_string(&AdjustmentType::Damage).unwrap(),
            "\"damage\""
        );
        assert_eq!(PaymentMethod::MobileMoney.as_str(), "mobile_money");
        assert_eq!(SaleStatus::OnHold.as_str(), "on_hold");
    }

    #[test]
    fn test_product_stock_checks() {
        let product = Product {
            id: 1,
            name: "Sugar 1kg".to_string(),
            sku: "SUG-1KG".to_string(),
            barcode: None,
            category: Some("Grocery".to_string()),
            supplier_id: None,
            price_cents: 1200,
            cost_price_cents: Some(800),
            stock_quantity: 4,
            low_stock_threshold: 5,
            expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(product.can_cover(4));
        assert!(!product.can_cover(5));
        assert!(product.is_low_stock());
        assert_eq!(product.price().cents(), 1200);
    }
}
