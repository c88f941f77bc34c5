//! # Purchase Order Repository
//!
//! Supplier purchase orders and their state machine.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Purchase Order Lifecycle                             │
//! │                                                                         │
//! │   create_order ──► PENDING ──► receive_order ──► RECEIVED (terminal)    │
//! │                       │            stock += qty per item                │
//! │                       │            cost_price overwritten per item      │
//! │                       │                                                 │
//! │                       └──► cancel_order ──► CANCELLED (terminal)        │
//! │                                 no side effects                         │
//! │                                                                         │
//! │  Both transitions are status-guarded UPDATEs: a second receive, or a    │
//! │  cancel after receive, affects zero rows and is rejected.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult, PosResult};
use crate::repository::activity;
use meridian_core::{CoreError, PurchaseItem, PurchaseOrder, PurchaseOrderStatus};

const ORDER_COLUMNS: &str = "id, supplier_id, status, total_cost_cents, created_by, order_date";

/// One requested line of a new purchase order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub product_id: i64,
    pub quantity: i64,
    pub cost_price_cents: i64,
}

/// Repository for purchase-order operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets an order by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all items for an order, in insertion order.
    pub async fn get_items(&self, order_id: i64) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT id, purchase_order_id, product_id, quantity, cost_price_cents, subtotal_cents
            FROM purchase_items
            WHERE purchase_order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists orders, newest first, optionally filtered by status, paged.
    pub async fn list(
        &self,
        status: Option<PurchaseOrderStatus>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<PurchaseOrder>> {
        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, PurchaseOrder>(&format!(
                    r#"
                    SELECT {ORDER_COLUMNS}
                    FROM purchase_orders
                    WHERE status = ?1
                    ORDER BY order_date DESC, id DESC
                    LIMIT ?2 OFFSET ?3
                    "#
                ))
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PurchaseOrder>(&format!(
                    r#"
                    SELECT {ORDER_COLUMNS}
                    FROM purchase_orders
                    ORDER BY order_date DESC, id DESC
                    LIMIT ?1 OFFSET ?2
                    "#
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    /// Lists a supplier's orders, newest first.
    pub async fn orders_for_supplier(&self, supplier_id: i64) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM purchase_orders
            WHERE supplier_id = ?1
            ORDER BY order_date DESC, id DESC
            "#
        ))
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Creates a pending order from the requested lines.
    ///
    /// Lines with a non-positive quantity or cost price are silently
    /// dropped, mirroring how the order form discards half-filled rows; if
    /// nothing survives the order fails with [`CoreError::EmptyOrder`].
    /// `total_cost` is the sum of the surviving subtotals.
    pub async fn create_order(
        &self,
        supplier_id: i64,
        created_by: i64,
        lines: &[PurchaseLineInput],
    ) -> PosResult<PurchaseOrder> {
        let valid: Vec<&PurchaseLineInput> = lines
            .iter()
            .filter(|l| l.quantity > 0 && l.cost_price_cents > 0)
            .collect();

        if valid.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }
        if valid.len() < lines.len() {
            debug!(
                dropped = lines.len() - valid.len(),
                "Dropped invalid purchase-order lines"
            );
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = sqlx::query(
            r#"
            INSERT INTO purchase_orders (supplier_id, status, total_cost_cents, created_by, order_date)
            VALUES (?1, 'pending', 0, ?2, ?3)
            "#,
        )
        .bind(supplier_id)
        .bind(created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let order_id = result.last_insert_rowid();
        let mut total_cost_cents: i64 = 0;

        for line in &valid {
            let subtotal_cents = line.quantity * line.cost_price_cents;
            total_cost_cents += subtotal_cents;

            sqlx::query(
                r#"
                INSERT INTO purchase_items (
                    purchase_order_id, product_id, quantity, cost_price_cents, subtotal_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.cost_price_cents)
            .bind(subtotal_cents)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        sqlx::query("UPDATE purchase_orders SET total_cost_cents = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(total_cost_cents)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        activity::append_in_tx(
            &mut tx,
            created_by,
            &format!(
                "Created purchase order #{} for {}",
                order_id, total_cost_cents
            ),
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, total = %total_cost_cents, items = valid.len(), "Purchase order created");

        Ok(PurchaseOrder {
            id: order_id,
            supplier_id,
            status: PurchaseOrderStatus::Pending,
            total_cost_cents,
            created_by,
            order_date: now,
        })
    }

    /// Receives a pending order: stock and cost price are applied per item,
    /// in one transaction.
    ///
    /// Only legal from `pending`. For every item `stock_quantity +=
    /// quantity` and the product's `cost_price_cents` is overwritten with
    /// the item's cost price; when a product appears on several lines the
    /// last line wins.
    pub async fn receive_order(&self, order_id: i64, user_id: i64) -> PosResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            "UPDATE purchase_orders SET status = 'received' WHERE id = ?1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_rejection(&mut tx, order_id).await?);
        }

        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT id, purchase_order_id, product_id, quantity, cost_price_cents, subtotal_cents
            FROM purchase_items
            WHERE purchase_order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::from)?;

        for item in &items {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity + ?2,
                    cost_price_cents = ?3,
                    updated_at = ?4
                WHERE id = ?1
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.cost_price_cents)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        activity::append_in_tx(
            &mut tx,
            user_id,
            &format!("Received purchase order #{}", order_id),
            now,
        )
        .await?;

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, items = items.len(), "Purchase order received");
        Ok(order)
    }

    /// Cancels a pending order. No stock or cost-price side effects.
    pub async fn cancel_order(&self, order_id: i64, user_id: i64) -> PosResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            "UPDATE purchase_orders SET status = 'cancelled' WHERE id = ?1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_rejection(&mut tx, order_id).await?);
        }

        activity::append_in_tx(
            &mut tx,
            user_id,
            &format!("Cancelled purchase order #{}", order_id),
            now,
        )
        .await?;

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, "Purchase order cancelled");
        Ok(order)
    }

    /// Figures out why a status-guarded transition affected zero rows:
    /// either the order doesn't exist, or it is no longer pending.
    async fn transition_rejection(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order_id: i64,
    ) -> PosResult<crate::error::PosError> {
        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(match order {
            Some(o) => CoreError::InvalidOrderStatus {
                order_id,
                status: o.status.as_str().to_string(),
            }
            .into(),
            None => CoreError::OrderNotFound(order_id).into(),
        })
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
    use crate::repository::product::NewProduct;
    use crate::repository::supplier::NewSupplier;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_supplier_and_product(db: &Database) -> (i64, i64) {
        let supplier = db
            .suppliers()
            .create(NewSupplier {
                name: "Accra Wholesale".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let product = db
            .products()
            .create(NewProduct {
                name: "Rice 5kg".to_string(),
                sku: "RICE-5KG".to_string(),
                price_cents: 9000,
                cost_price_cents: Some(6000),
                stock_quantity: 10,
                low_stock_threshold: 5,
                supplier_id: Some(supplier.id),
                ..Default::default()
            })
            .await
            .unwrap();

        (supplier.id, product.id)
    }

    #[tokio::test]
    async fn test_create_order_drops_invalid_lines() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let order = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[
                    PurchaseLineInput {
                        product_id,
                        quantity: 10,
                        cost_price_cents: 5500,
                    },
                    // Invalid rows: dropped, not rejected
                    PurchaseLineInput {
                        product_id,
                        quantity: 0,
                        cost_price_cents: 5500,
                    },
                    PurchaseLineInput {
                        product_id,
                        quantity: 3,
                        cost_price_cents: 0,
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(order.status, PurchaseOrderStatus::Pending);
        assert_eq!(order.total_cost_cents, 55_000);
        assert_eq!(db.purchases().get_items(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_order_with_no_valid_lines_rejected() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let err = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[PurchaseLineInput {
                    product_id,
                    quantity: 0,
                    cost_price_cents: 100,
                }],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PosError::Core(CoreError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_receive_applies_stock_and_cost() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let order = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[PurchaseLineInput {
                    product_id,
                    quantity: 20,
                    cost_price_cents: 5500,
                }],
            )
            .await
            .unwrap();

        let received = db.purchases().receive_order(order.id, 1).await.unwrap();
        assert_eq!(received.status, PurchaseOrderStatus::Received);

        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 30); // 10 + 20
        assert_eq!(product.cost_price_cents, Some(5500));
    }

    #[tokio::test]
    async fn test_receive_twice_rejected() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let order = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[PurchaseLineInput {
                    product_id,
                    quantity: 5,
                    cost_price_cents: 100,
                }],
            )
            .await
            .unwrap();

        db.purchases().receive_order(order.id, 1).await.unwrap();
        let err = db.purchases().receive_order(order.id, 1).await.unwrap_err();

        assert!(matches!(
            err,
            PosError::Core(CoreError::InvalidOrderStatus { .. })
        ));

        // Stock applied exactly once
        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 15);
    }

    #[tokio::test]
    async fn test_last_line_wins_on_repeated_product() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let order = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[
                    PurchaseLineInput {
                        product_id,
                        quantity: 5,
                        cost_price_cents: 5000,
                    },
                    PurchaseLineInput {
                        product_id,
                        quantity: 5,
                        cost_price_cents: 5800,
                    },
                ],
            )
            .await
            .unwrap();

        db.purchases().receive_order(order.id, 1).await.unwrap();

        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 20); // 10 + 5 + 5
        assert_eq!(product.cost_price_cents, Some(5800));
    }

    #[tokio::test]
    async fn test_cancel_only_from_pending_and_no_side_effects() {
        let db = test_db().await;
        let (supplier_id, product_id) = seed_supplier_and_product(&db).await;

        let order = db
            .purchases()
            .create_order(
                supplier_id,
                1,
                &[PurchaseLineInput {
                    product_id,
                    quantity: 5,
                    cost_price_cents: 100,
                }],
            )
            .await
            .unwrap();

        let cancelled = db.purchases().cancel_order(order.id, 1).await.unwrap();
        assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);

        // No stock movement
        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);

        // Terminal: receive after cancel is rejected
        let err = db.purchases().receive_order(order.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::InvalidOrderStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let db = test_db().await;
        let err = db.purchases().receive_order(404, 1).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::OrderNotFound(404))));
    }
}
