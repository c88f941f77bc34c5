//! # Product Repository
//!
//! Database operations for the product catalog: CRUD, search, low-stock
//! listing, and the stock-adjustment workflow.
//!
//! ## Stock Mutation Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            The ONLY ways stock_quantity changes                         │
//! │                                                                         │
//! │  Checkout       ──► engine::checkout   (decrement, guarded)             │
//! │  Refund         ──► engine::refund     (restore)                        │
//! │  Adjustment     ──► adjust_stock here  (signed delta, guarded)          │
//! │  PO receipt     ──► PurchaseRepository::receive_order (increment)       │
//! │                                                                         │
//! │  Every subtraction is guarded in SQL: stock never goes below zero.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult, PosResult};
use crate::repository::activity;
use meridian_core::validation::{validate_name, validate_price_cents, validate_sku};
use meridian_core::{AdjustmentType, CoreError, Product, StockAdjustment};

/// Column list shared by every product SELECT.
const PRODUCT_COLUMNS: &str = "id, name, sku, barcode, category, supplier_id, price_cents, \
     cost_price_cents, stock_quantity, low_stock_threshold, expiry_date, created_at, updated_at";

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub supplier_id: Option<i64>,
    pub price_cents: i64,
    pub cost_price_cents: Option<i64>,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub expiry_date: Option<NaiveDate>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Creates a product. Duplicate SKU/barcode surfaces as
    /// [`DbError::UniqueViolation`] from the schema constraint.
    pub async fn create(&self, new: NewProduct) -> PosResult<Product> {
        validate_name(&new.name).map_err(CoreError::from)?;
        validate_sku(&new.sku).map_err(CoreError::from)?;
        validate_price_cents(new.price_cents).map_err(CoreError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                name, sku, barcode, category, supplier_id,
                price_cents, cost_price_cents, stock_quantity,
                low_stock_threshold, expiry_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(&new.name)
        .bind(&new.sku)
        .bind(&new.barcode)
        .bind(&new.category)
        .bind(new.supplier_id)
        .bind(new.price_cents)
        .bind(new.cost_price_cents)
        .bind(new.stock_quantity)
        .bind(new.low_stock_threshold)
        .bind(new.expiry_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        let id = result.last_insert_rowid();
        info!(id = %id, sku = %new.sku, "Product created");

        Ok(Product {
            id,
            name: new.name,
            sku: new.sku,
            barcode: new.barcode,
            category: new.category,
            supplier_id: new.supplier_id,
            price_cents: new.price_cents,
            cost_price_cents: new.cost_price_cents,
            stock_quantity: new.stock_quantity,
            low_stock_threshold: new.low_stock_threshold,
            expiry_date: new.expiry_date,
            created_at: now,
            updated_at: now,
        })
    }

    /// Updates a product's catalog fields (full-row update, as the edit form
    /// posts every field). Stock is deliberately NOT written here; stock
    /// moves only through the guarded mutation paths.
    pub async fn update(&self, product: &Product) -> PosResult<()> {
        validate_name(&product.name).map_err(CoreError::from)?;
        validate_sku(&product.sku).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                barcode = ?4,
                category = ?5,
                supplier_id = ?6,
                price_cents = ?7,
                cost_price_cents = ?8,
                low_stock_threshold = ?9,
                expiry_date = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.category)
        .bind(product.supplier_id)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.low_stock_threshold)
        .bind(product.expiry_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id).into());
        }

        Ok(())
    }

    /// Deletes a product. Refused while sale history references it.
    pub async fn delete(&self, id: i64) -> PosResult<()> {
        let sale_refs: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::from)?;

        if sale_refs > 0 {
            return Err(CoreError::ProductInUse(id).into());
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id).into());
        }

        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// Searches products by name, SKU, or barcode substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(limit, 0).await;
        }

        let pattern = format!("%{}%", query);

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE name LIKE ?1 OR sku LIKE ?1 OR barcode LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Searches only products that are in stock (POS sale screen).
    pub async fn search_sellable(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (name LIKE ?1 OR sku LIKE ?1 OR barcode LIKE ?1)
              AND stock_quantity > 0
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products ordered by name, paged.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products in a category, paged.
    pub async fn list_by_category(
        &self,
        category: &str,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE category = ?1
            ORDER BY name
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products at or below their low-stock threshold, lowest first.
    ///
    /// Stock cannot be negative anywhere in the system, so unlike the old
    /// behavior there is nothing to repair before reading.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE stock_quantity <= low_stock_threshold
            ORDER BY stock_quantity
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists the distinct category labels in use.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Applies a stock adjustment and records it, in one transaction.
    ///
    /// ## Semantics
    /// - `Damage`: subtracts `quantity` (must be positive)
    /// - `Return`: adds `quantity` (must be positive)
    /// - `Manual`: applies the signed `quantity` directly
    ///
    /// Subtractions are guarded in the UPDATE itself; an adjustment that
    /// would take stock below zero fails with
    /// [`CoreError::InsufficientStock`] and nothing is recorded.
    pub async fn adjust_stock(
        &self,
        product_id: i64,
        adjustment_type: AdjustmentType,
        quantity: i64,
        note: Option<String>,
        created_by: i64,
    ) -> PosResult<StockAdjustment> {
        let delta = match adjustment_type {
            AdjustmentType::Damage => {
                if quantity <= 0 {
                    return Err(CoreError::Validation(
                        meridian_core::ValidationError::MustBePositive {
                            field: "quantity".to_string(),
                        },
                    )
                    .into());
                }
                -quantity
            }
            AdjustmentType::Return => {
                if quantity <= 0 {
                    return Err(CoreError::Validation(
                        meridian_core::ValidationError::MustBePositive {
                            field: "quantity".to_string(),
                        },
                    )
                    .into());
                }
                quantity
            }
            AdjustmentType::Manual => quantity,
        };

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND stock_quantity + ?2 >= 0
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            // Distinguish missing product from a floor violation
            let product = sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
            ))
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from)?;

            return match product {
                Some(p) => Err(CoreError::InsufficientStock {
                    name: p.name,
                    available: p.stock_quantity,
                    requested: -delta,
                }
                .into()),
                None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
            };
        }

        let result = sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                product_id, adjustment_type, quantity, note, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(product_id)
        .bind(adjustment_type)
        .bind(quantity)
        .bind(&note)
        .bind(created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let adjustment_id = result.last_insert_rowid();

        activity::append_in_tx(
            &mut tx,
            created_by,
            &format!(
                "Stock adjustment for product #{}: {} {} units",
                product_id,
                adjustment_type.as_str(),
                quantity
            ),
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            product_id = %product_id,
            adjustment_type = %adjustment_type.as_str(),
            quantity = %quantity,
            "Stock adjusted"
        );

        Ok(StockAdjustment {
            id: adjustment_id,
            product_id,
            adjustment_type,
            quantity,
            note,
            created_by,
            created_at: now,
        })
    }

    /// Lists recorded adjustments, newest first, paged.
    pub async fn list_adjustments(
        &self,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<StockAdjustment>> {
        let adjustments = sqlx::query_as::<_, StockAdjustment>(
            r#"
            SELECT id, product_id, adjustment_type, quantity, note, created_by, created_at
            FROM stock_adjustments
            ORDER BY created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(adjustments)
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

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            name: format!("Product {}", sku),
            sku: sku.to_string(),
            price_cents: 1000,
            stock_quantity: stock,
            low_stock_threshold: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let db = test_db().await;
        let repo = db.products();

        let created = repo.create(sample("SUG-1KG", 20)).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.sku, "SUG-1KG");
        assert_eq!(fetched.stock_quantity, 20);

        let by_sku = repo.get_by_sku("SUG-1KG").await.unwrap().unwrap();
        assert_eq!(by_sku.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected_by_schema() {
        let db = test_db().await;
        let repo = db.products();

        repo.create(sample("DUP-1", 0)).await.unwrap();
        let err = repo.create(sample("DUP-1", 0)).await.unwrap_err();
        assert!(matches!(
            err,
            PosError::Db(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_matches_name_and_sku() {
        let db = test_db().await;
        let repo = db.products();

        repo.create(sample("RICE-5KG", 10)).await.unwrap();
        repo.create(sample("OIL-1L", 10)).await.unwrap();

        let hits = repo.search("rice", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sku, "RICE-5KG");
    }

    #[tokio::test]
    async fn test_adjustments_damage_return_manual() {
        let db = test_db().await;
        let repo = db.products();
        let product = repo.create(sample("ADJ-1", 10)).await.unwrap();

        repo.adjust_stock(product.id, AdjustmentType::Damage, 3, None, 1)
            .await
            .unwrap();
        assert_eq!(
            repo.get_by_id(product.id).await.unwrap().unwrap().stock_quantity,
            7
        );

        repo.adjust_stock(product.id, AdjustmentType::Return, 2, None, 1)
            .await
            .unwrap();
        assert_eq!(
            repo.get_by_id(product.id).await.unwrap().unwrap().stock_quantity,
            9
        );

        // Manual applies the signed quantity directly
        repo.adjust_stock(product.id, AdjustmentType::Manual, -4, None, 1)
            .await
            .unwrap();
        assert_eq!(
            repo.get_by_id(product.id).await.unwrap().unwrap().stock_quantity,
            5
        );

        assert_eq!(repo.list_adjustments(10, 0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_adjustment_cannot_take_stock_negative() {
        let db = test_db().await;
        let repo = db.products();
        let product = repo.create(sample("ADJ-2", 2)).await.unwrap();

        let err = repo
            .adjust_stock(product.id, AdjustmentType::Damage, 5, None, 1)
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

        // Nothing recorded, stock unchanged
        assert_eq!(
            repo.get_by_id(product.id).await.unwrap().unwrap().stock_quantity,
            2
        );
        assert!(repo.list_adjustments(10, 0).await.unwrap().is_empty());

        // Same floor for negative manual corrections
        let err = repo
            .adjust_stock(product.id, AdjustmentType::Manual, -3, None, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_damage_quantity_must_be_positive() {
        let db = test_db().await;
        let repo = db.products();
        let product = repo.create(sample("ADJ-3", 10)).await.unwrap();

        let err = repo
            .adjust_stock(product.id, AdjustmentType::Damage, -3, None, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = test_db().await;
        let repo = db.products();

        repo.create(sample("LOW-1", 2)).await.unwrap();
        repo.create(sample("LOW-2", 5)).await.unwrap(); // at threshold counts
        repo.create(sample("OK-1", 50)).await.unwrap();

        let low = repo.list_low_stock().await.unwrap();
        assert_eq!(low.len(), 2);
        // Lowest stock first
        assert_eq!(low[0].sku, "LOW-1");
    }

    #[tokio::test]
    async fn test_categories() {
        let db = test_db().await;
        let repo = db.products();

        let mut a = sample("CAT-1", 1);
        a.category = Some("Beverages".to_string());
        let mut b = sample("CAT-2", 1);
        b.category = Some("Grocery".to_string());
        let c = sample("CAT-3", 1); // no category

        repo.create(a).await.unwrap();
        repo.create(b).await.unwrap();
        repo.create(c).await.unwrap();

        let categories = repo.categories().await.unwrap();
        assert_eq!(categories, vec!["Beverages", "Grocery"]);
    }

    #[tokio::test]
    async fn test_delete_refused_with_sales_history() {
        use meridian_core::{CartSessions, PaymentMethod};

        let db = test_db().await;
        let repo = db.products();
        let product = repo.create(sample("SOLD-1", 10)).await.unwrap();

        let sessions = CartSessions::new();
        let engine = db.checkout();
        engine
            .add_to_cart(&sessions, "s1", product.id, 1)
            .await
            .unwrap();
        engine
            .checkout(
                &sessions,
                "s1",
                crate::engine::CheckoutRequest {
                    cashier_id: 1,
                    customer_id: None,
                    payment_method: Some(PaymentMethod::Cash),
                    discount_cents: 0,
                },
            )
            .await
            .unwrap();

        let err = repo.delete(product.id).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::ProductInUse(_))));

        // Without history, delete works
        let fresh = repo.create(sample("FRESH-1", 0)).await.unwrap();
        repo.delete(fresh.id).await.unwrap();
        assert!(repo.get_by_id(fresh.id).await.unwrap().is_none());
    }
}
