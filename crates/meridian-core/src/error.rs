//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                       │
//! │  ├── CoreError        - Business-rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                     │
//! │  └── PosError         - Core ∪ Db, returned by the engines              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors are enum variants, never bare strings, and each variant's message
//! is suitable to show a cashier as-is.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations and domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or was deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Requested quantity exceeds the product's available stock.
    ///
    /// Raised at cart-add time against the product snapshot, and again at
    /// checkout against authoritative stock inside the commit transaction.
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Checkout or hold attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Checkout submitted without a payment method.
    #[error("Payment method is required")]
    MissingPaymentMethod,

    /// Quantity update targets a product that is not in the cart.
    #[error("Product {0} not in cart")]
    ProductNotInCart(i64),

    /// Resume attempted with an unknown hold identifier.
    #[error("Held sale not found: {0}")]
    HoldNotFound(String),

    /// Delete attempted on a product that sale history still references.
    #[error("Cannot delete product {0}: it has sales history")]
    ProductInUse(i64),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    /// Sale is not in a state that allows the requested operation,
    /// e.g. refunding an already refunded sale.
    #[error("Sale {sale_id} is {status}, cannot perform operation")]
    InvalidSaleStatus { sale_id: i64, status: String },

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// Payment posted against a customer account exceeds the balance owed.
    #[error("Payment amount cannot exceed credit balance: requested {requested}, balance {balance}")]
    PaymentExceedsBalance { requested: i64, balance: i64 },

    /// Purchase order cannot be found.
    #[error("Purchase order not found: {0}")]
    OrderNotFound(i64),

    /// Purchase order is not in a state that allows the requested transition.
    /// Receive and cancel are only legal from `pending`.
    #[error("Purchase order {order_id} is {status}, cannot perform operation")]
    InvalidOrderStatus { order_id: i64, status: String },

    /// Purchase order submitted with no valid line items.
    #[error("Purchase order must contain at least one item")]
    EmptyOrder,

    /// Cart has exceeded maximum allowed line count.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad SKU characters, malformed barcode, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g. duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            name: "Sugar 1kg".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Sugar 1kg: available 3, requested 5"
        );

        let err = CoreError::PaymentExceedsBalance {
            requested: 5000,
            balance: 2500,
        };
        assert_eq!(
            err.to_string(),
            "Payment amount cannot exceed credit balance: requested 5000, balance 2500"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
