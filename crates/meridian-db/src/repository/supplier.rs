//! # Supplier Repository
//!
//! CRUD and search for suppliers. Purchase-order state lives in
//! [`PurchaseRepository`](crate::repository::purchase::PurchaseRepository).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult, PosResult};
use meridian_core::validation::validate_name;
use meridian_core::{CoreError, Supplier};

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, phone, email, address, created_at";

/// Input for creating a supplier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Repository for supplier database operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Gets a supplier by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    /// Creates a supplier.
    pub async fn create(&self, new: NewSupplier) -> PosResult<Supplier> {
        validate_name(&new.name).map_err(CoreError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO suppliers (name, contact_person, phone, email, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&new.name)
        .bind(&new.contact_person)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(&new.address)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        let id = result.last_insert_rowid();
        info!(id = %id, name = %new.name, "Supplier created");

        Ok(Supplier {
            id,
            name: new.name,
            contact_person: new.contact_person,
            phone: new.phone,
            email: new.email,
            address: new.address,
            created_at: now,
        })
    }

    /// Updates a supplier (full-row update).
    pub async fn update(&self, supplier: &Supplier) -> PosResult<()> {
        validate_name(&supplier.name).map_err(CoreError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?2, contact_person = ?3, phone = ?4, email = ?5, address = ?6
            WHERE id = ?1
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", supplier.id).into());
        }

        Ok(())
    }

    /// Lists suppliers ordered by name, paged.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(suppliers)
    }

    /// Searches suppliers by name, contact person, or phone substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Supplier>> {
        let pattern = format!("%{}%", query.trim());

        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM suppliers
            WHERE name LIKE ?1 OR contact_person LIKE ?1 OR phone LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(suppliers)
    }

    /// Lists the products usually ordered from a supplier.
    pub async fn products_for(&self, supplier_id: i64) -> DbResult<Vec<meridian_core::Product>> {
        let products = sqlx::query_as::<_, meridian_core::Product>(
            r#"
            SELECT id, name, sku, barcode, category, supplier_id, price_cents,
                   cost_price_cents, stock_quantity, low_stock_threshold,
                   expiry_date, created_at, updated_at
            FROM products
            WHERE supplier_id = ?1
            ORDER BY name
            "#,
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}
