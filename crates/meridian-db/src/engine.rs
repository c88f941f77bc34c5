//! # Checkout Engine
//!
//! The transactional heart of the POS: turning a cart into a persisted
//! sale, and reversing one.
//!
//! ## Checkout Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Transaction                               │
//! │                                                                         │
//! │  CartSessions ──snapshot──► validate (non-empty, payment method)        │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                    recompute subtotal, clamp discount                   │
//! │                                   │                                     │
//! │  ┌────────────────────────  BEGIN ▼ ─────────────────────────────────┐  │
//! │  │  per line: UPDATE products                                        │  │
//! │  │            SET stock_quantity = stock_quantity - qty              │  │
//! │  │            WHERE id = ? AND stock_quantity >= qty                 │  │
//! │  │            └── 0 rows? ──► InsufficientStock, ROLLBACK            │  │
//! │  │  INSERT sale (completed)                                          │  │
//! │  │  INSERT sale_items (snapshot per line)                            │  │
//! │  │  INSERT receipt  ("R" + sale id, 6 digits)                        │  │
//! │  │  INSERT activity entry                                            │  │
//! │  └────────────────────────  COMMIT ─────────────────────────────────┘  │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                      clear cart session, return outcome                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock validation and decrement are the same guarded statement, inside
//! the same transaction as the sale rows. Two carts racing for the last
//! unit serialize on that UPDATE; the loser's transaction rolls back whole
//! and its cart is left untouched. There is no commit point at which a
//! sale exists without its stock decrement.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, PosResult};
use crate::repository::activity;
use meridian_core::{
    receipt_number_for, Cart, CartSessions, CoreError, Money, PaymentMethod, Product, Receipt,
    Sale, SaleItem, SaleStatus,
};

// =============================================================================
// Request / Outcome
// =============================================================================

/// Input to a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Cashier processing the sale (from the auth layer).
    pub cashier_id: i64,

    /// Customer to attribute the sale to, for credit sales.
    pub customer_id: Option<i64>,

    /// Tender. `None` fails with [`CoreError::MissingPaymentMethod`]; the
    /// tender form can be submitted without a selection.
    pub payment_method: Option<PaymentMethod>,

    /// Requested discount in minor units; clamped into `[0, subtotal]`.
    pub discount_cents: i64,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub receipt: Receipt,

    /// True when the requested discount exceeded the subtotal and was
    /// capped. Informational, not an error; the front end shows a note.
    pub discount_adjusted: bool,
}

// =============================================================================
// Checkout Engine
// =============================================================================

/// Executes checkouts and refunds as single atomic transactions.
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    pool: SqlitePool,
}

impl CheckoutEngine {
    /// Creates a new CheckoutEngine.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutEngine { pool }
    }

    /// Checks out the session's cart.
    ///
    /// On success the sale, its items, the receipt, and every stock
    /// decrement are committed together and the session's cart is cleared.
    /// On any failure nothing is persisted and the cart is left untouched.
    ///
    /// The subtotal is recomputed from the cart snapshot here; totals
    /// submitted by the client are never trusted.
    pub async fn checkout(
        &self,
        sessions: &CartSessions,
        session_id: &str,
        request: CheckoutRequest,
    ) -> PosResult<CheckoutOutcome> {
        let cart = sessions.snapshot(session_id);

        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        let payment_method = request
            .payment_method
            .ok_or(CoreError::MissingPaymentMethod)?;

        let subtotal = Money::from_cents(cart.subtotal_cents());
        let discount = Money::from_cents(request.discount_cents).clamp(Money::zero(), subtotal);
        let discount_adjusted = request.discount_cents > subtotal.cents();
        let total = subtotal - discount;

        debug!(
            session_id = %session_id,
            lines = cart.line_count(),
            subtotal = %subtotal,
            discount = %discount,
            "Starting checkout"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Stock gate + decrement, one guarded statement per line. A line
        // that cannot be covered aborts the whole transaction.
        for line in &cart.lines {
            let updated = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - ?2, updated_at = ?3
                WHERE id = ?1 AND stock_quantity >= ?2
                "#,
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

            if updated.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(DbError::from)?;

                return match available {
                    Some(available) => Err(CoreError::InsufficientStock {
                        name: line.name.clone(),
                        available,
                        requested: line.quantity,
                    }
                    .into()),
                    None => Err(CoreError::ProductNotFound(line.name.clone()).into()),
                };
            }
        }

        let sale_result = sqlx::query(
            r#"
            INSERT INTO sales (
                cashier_id, customer_id, subtotal_cents, discount_cents,
                total_cents, payment_method, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(request.cashier_id)
        .bind(request.customer_id)
        .bind(subtotal.cents())
        .bind(discount.cents())
        .bind(total.cents())
        .bind(payment_method)
        .bind(SaleStatus::Completed)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let sale_id = sale_result.last_insert_rowid();

        let mut items = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let item_result = sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, product_id, quantity, unit_price_cents, total_price_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.total_cents())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

            items.push(SaleItem {
                id: item_result.last_insert_rowid(),
                sale_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                total_price_cents: line.total_cents(),
            });
        }

        let receipt_number = receipt_number_for(sale_id);
        let receipt_result = sqlx::query(
            "INSERT INTO receipts (sale_id, receipt_number, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(sale_id)
        .bind(&receipt_number)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        activity::append_in_tx(
            &mut tx,
            request.cashier_id,
            &format!("Processed sale #{} for {}", sale_id, total),
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        // Only after the commit: the cart is gone, the sale is real.
        sessions.clear(session_id);

        info!(
            sale_id = %sale_id,
            receipt = %receipt_number,
            total = %total,
            items = items.len(),
            "Sale completed"
        );

        Ok(CheckoutOutcome {
            sale: Sale {
                id: sale_id,
                cashier_id: request.cashier_id,
                customer_id: request.customer_id,
                subtotal_cents: subtotal.cents(),
                discount_cents: discount.cents(),
                total_cents: total.cents(),
                payment_method,
                status: SaleStatus::Completed,
                created_at: now,
            },
            items,
            receipt: Receipt {
                id: receipt_result.last_insert_rowid(),
                sale_id,
                receipt_number,
                created_at: now,
            },
            discount_adjusted,
        })
    }

    /// Refunds a completed sale: flips the status and restores every item's
    /// quantity to stock, in one transaction.
    ///
    /// Only legal from `completed` (the status-guarded UPDATE rejects a
    /// second refund). Discounts, customer credit, and tender are not
    /// reversed; a refund is a stock-and-status operation.
    pub async fn refund(&self, sale_id: i64, user_id: i64, reason: &str) -> PosResult<Sale> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            "UPDATE sales SET status = 'refunded' WHERE id = ?1 AND status = 'completed'",
        )
        .bind(sale_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            let status: Option<SaleStatus> =
                sqlx::query_scalar("SELECT status FROM sales WHERE id = ?1")
                    .bind(sale_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DbError::from)?;

            return match status {
                Some(status) => Err(CoreError::InvalidSaleStatus {
                    sale_id,
                    status: status.as_str().to_string(),
                }
                .into()),
                None => Err(CoreError::SaleNotFound(sale_id).into()),
            };
        }

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price_cents, total_price_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::from)?;

        for item in &items {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity + ?2, updated_at = ?3
                WHERE id = ?1
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        activity::append_in_tx(
            &mut tx,
            user_id,
            &format!("Refunded sale #{}: {}", sale_id, reason),
            now,
        )
        .await?;

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, cashier_id, customer_id, subtotal_cents, discount_cents,
                   total_cents, payment_method, status, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(sale_id = %sale_id, items = items.len(), "Sale refunded");
        Ok(sale)
    }

    /// Adds a product to a session's cart, re-reading the product first so
    /// the stock gate sees current data.
    ///
    /// Convenience wrapper the POS screen calls; the authoritative check
    /// still happens inside [`checkout`](CheckoutEngine::checkout).
    pub async fn add_to_cart(
        &self,
        sessions: &CartSessions,
        session_id: &str,
        product_id: i64,
        quantity: i64,
    ) -> PosResult<Cart> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, sku, barcode, category, supplier_id, price_cents,
                   cost_price_cents, stock_quantity, low_stock_threshold,
                   expiry_date, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let cart = sessions.with_cart_mut(session_id, |cart| {
            cart.add_line(&product, quantity).map(|_| cart.clone())
        })?;
        Ok(cart)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::customer::NewCustomer;
    use crate::repository::product::NewProduct;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> i64 {
        db.products()
            .create(NewProduct {
                name: format!("Product {}", sku),
                sku: sku.to_string(),
                price_cents,
                stock_quantity: stock,
                low_stock_threshold: 5,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    fn cash_request() -> CheckoutRequest {
        CheckoutRequest {
            cashier_id: 1,
            customer_id: None,
            payment_method: Some(PaymentMethod::Cash),
            discount_cents: 0,
        }
    }

    #[tokio::test]
    async fn test_checkout_happy_path() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        // Cart: product A, qty 2, price 10.00
        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 2)
            .await
            .unwrap();

        let outcome = engine
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap();

        assert_eq!(outcome.sale.subtotal_cents, 2000);
        assert_eq!(outcome.sale.total_cents, 2000);
        assert_eq!(outcome.sale.status, SaleStatus::Completed);
        assert!(!outcome.discount_adjusted);

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].quantity, 2);
        assert_eq!(outcome.items[0].unit_price_cents, 1000);
        assert_eq!(outcome.items[0].total_price_cents, 2000);

        assert_eq!(
            outcome.receipt.receipt_number,
            format!("R{:06}", outcome.sale.id)
        );

        // Stock decremented by exactly the purchased quantity
        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 8);

        // Cart cleared on success
        assert!(sessions.snapshot("s1").is_empty());

        // Everything is queryable through the read side
        let sale = db.sales().get_by_id(outcome.sale.id).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 2000);
        let receipt = db.sales().get_receipt(sale.id).await.unwrap().unwrap();
        assert_eq!(receipt.receipt_number, outcome.receipt.receipt_number);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_rejected() {
        let db = test_db().await;
        let sessions = CartSessions::new();

        let err = db
            .checkout()
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_checkout_missing_payment_method_rejected() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 1)
            .await
            .unwrap();

        let err = engine
            .checkout(
                &sessions,
                "s1",
                CheckoutRequest {
                    payment_method: None,
                    ..cash_request()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PosError::Core(CoreError::MissingPaymentMethod)
        ));
        // Cart untouched
        assert_eq!(sessions.snapshot("s1").total_quantity(), 1);
    }

    #[tokio::test]
    async fn test_checkout_discount_clamped_to_subtotal() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        // Subtotal 10.00, discount submitted as 15.00
        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 1)
            .await
            .unwrap();

        let outcome = engine
            .checkout(
                &sessions,
                "s1",
                CheckoutRequest {
                    discount_cents: 1500,
                    ..cash_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.discount_cents, 1000);
        assert_eq!(outcome.sale.total_cents, 0);
        assert!(outcome.discount_adjusted);
    }

    #[tokio::test]
    async fn test_checkout_negative_discount_clamped_to_zero() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 1)
            .await
            .unwrap();

        let outcome = engine
            .checkout(
                &sessions,
                "s1",
                CheckoutRequest {
                    discount_cents: -500,
                    ..cash_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.discount_cents, 0);
        assert_eq!(outcome.sale.total_cents, 1000);
        // Capping note is only for discounts above the subtotal
        assert!(!outcome.discount_adjusted);
    }

    #[tokio::test]
    async fn test_checkout_insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let plenty_id = seed_product(&db, "PLENTY", 500, 100).await;
        let scarce_id = seed_product(&db, "SCARCE", 1000, 5).await;

        engine
            .add_to_cart(&sessions, "s1", plenty_id, 3)
            .await
            .unwrap();
        engine
            .add_to_cart(&sessions, "s1", scarce_id, 5)
            .await
            .unwrap();

        // Someone else takes the scarce stock between add and checkout
        db.products()
            .adjust_stock(
                scarce_id,
                meridian_core::AdjustmentType::Damage,
                3,
                None,
                1,
            )
            .await
            .unwrap();

        let err = engine
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::InsufficientStock {
                available: 2,
                requested: 5,
                ..
            })
        ));

        // The other line's decrement rolled back with the transaction
        let plenty = db.products().get_by_id(plenty_id).await.unwrap().unwrap();
        assert_eq!(plenty.stock_quantity, 100);

        // No sale, no items, no receipt
        assert!(db.sales().get_by_id(1).await.unwrap().is_none());

        // Cart untouched so the cashier can amend it
        assert_eq!(sessions.snapshot("s1").line_count(), 2);
    }

    #[tokio::test]
    async fn test_checkout_attributes_customer() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let customer = db
            .customers()
            .create(NewCustomer {
                name: "Ama".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 1)
            .await
            .unwrap();

        let outcome = engine
            .checkout(
                &sessions,
                "s1",
                CheckoutRequest {
                    customer_id: Some(customer.id),
                    ..cash_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.customer_id, Some(customer.id));
        let for_customer = db.customers().sales_for(customer.id).await.unwrap();
        assert_eq!(for_customer.len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_numbers_follow_sale_ids() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;

        for expected_id in 1..=3i64 {
            engine
                .add_to_cart(&sessions, "s1", product_id, 1)
                .await
                .unwrap();
            let outcome = engine
                .checkout(&sessions, "s1", cash_request())
                .await
                .unwrap();
            assert_eq!(outcome.sale.id, expected_id);
            assert_eq!(
                outcome.receipt.receipt_number,
                format!("R{:06}", expected_id)
            );
        }
    }

    #[tokio::test]
    async fn test_refund_restores_stock_and_flips_status() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 4)
            .await
            .unwrap();
        let outcome = engine
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap();

        let before = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(before.stock_quantity, 6);

        let refunded = engine
            .refund(outcome.sale.id, 1, "customer returned goods")
            .await
            .unwrap();
        assert_eq!(refunded.status, SaleStatus::Refunded);

        let after = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_double_refund_rejected() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 2)
            .await
            .unwrap();
        let outcome = engine
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap();

        engine.refund(outcome.sale.id, 1, "first").await.unwrap();
        let err = engine
            .refund(outcome.sale.id, 1, "second")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PosError::Core(CoreError::InvalidSaleStatus { .. })
        ));

        // Stock restored exactly once
        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_refund_unknown_sale() {
        let db = test_db().await;
        let err = db.checkout().refund(404, 1, "nope").await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::SaleNotFound(404))));
    }

    #[tokio::test]
    async fn test_hold_resume_then_checkout() {
        let db = test_db().await;
        let engine = db.checkout();
        let sessions = CartSessions::new();

        let product_id = seed_product(&db, "A", 1000, 10).await;
        engine
            .add_to_cart(&sessions, "s1", product_id, 2)
            .await
            .unwrap();

        let hold_id = sessions.hold("s1").unwrap();
        assert!(sessions.snapshot("s1").is_empty());

        sessions.resume("s1", &hold_id).unwrap();
        let outcome = engine
            .checkout(&sessions, "s1", cash_request())
            .await
            .unwrap();
        assert_eq!(outcome.sale.total_cents, 2000);
    }
}
