//! # Sale Repository
//!
//! Read side for sales, items, and receipts.
//!
//! Sales are born finalized: the checkout engine writes the sale, its
//! items, the receipt, and the stock decrements in one transaction
//! (see [`crate::engine::CheckoutEngine`]), and a refund is the only
//! later mutation. What remains here are the lookups the receipt screen
//! and sales history need.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Receipt, Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = "id, cashier_id, customer_id, subtotal_cents, discount_cents, \
     total_cents, payment_method, status, created_at";

/// Repository for sale lookups.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price_cents, total_price_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the receipt for a sale.
    pub async fn get_receipt(&self, sale_id: i64) -> DbResult<Option<Receipt>> {
        let receipt = sqlx::query_as::<_, Receipt>(
            "SELECT id, sale_id, receipt_number, created_at FROM receipts WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receipt)
    }

    /// Looks a sale up by its receipt number.
    pub async fn get_by_receipt_number(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE id = (SELECT sale_id FROM receipts WHERE receipt_number = ?1)
            "#
        ))
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lists sales with a given status, newest first, paged.
    pub async fn list_by_status(
        &self,
        status: SaleStatus,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Sale>> {
        debug!(status = %status.as_str(), limit = %limit, "Listing sales");

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE status = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists completed sales, newest first, paged (the sales-history view).
    pub async fn list_recent(&self, limit: u32, offset: u32) -> DbResult<Vec<Sale>> {
        self.list_by_status(SaleStatus::Completed, limit, offset)
            .await
    }
}
