//! # Customer Repository
//!
//! Customer records and the credit ledger.
//!
//! ## Credit Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Credit Ledger Postings                               │
//! │                                                                         │
//! │  add_credit(+500)      balance  0 ──► 500    entry: credit 500          │
//! │  record_payment(200)   balance 500 ──► 300   entry: payment 200         │
//! │  record_payment(400)   REJECTED (exceeds balance), balance unchanged    │
//! │                                                                         │
//! │  Balance and posting always move together, in one transaction.          │
//! │  Amounts are strictly positive in both directions.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult, PosResult};
use crate::repository::activity;
use meridian_core::validation::{validate_amount_cents, validate_name};
use meridian_core::{CoreError, CreditEntryType, CreditTransaction, Customer, Sale};

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, credit_balance_cents, created_at";

/// Input for creating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Repository for customer database operations and the credit ledger.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Creates a customer with a zero balance.
    pub async fn create(&self, new: NewCustomer) -> PosResult<Customer> {
        validate_name(&new.name).map_err(CoreError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO customers (name, phone, email, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&new.name)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        let id = result.last_insert_rowid();
        info!(id = %id, name = %new.name, "Customer created");

        Ok(Customer {
            id,
            name: new.name,
            phone: new.phone,
            email: new.email,
            credit_balance_cents: 0,
            created_at: now,
        })
    }

    /// Updates a customer's contact fields. The balance moves only through
    /// ledger postings.
    pub async fn update(&self, customer: &Customer) -> PosResult<()> {
        validate_name(&customer.name).map_err(CoreError::from)?;

        let result = sqlx::query(
            "UPDATE customers SET name = ?2, phone = ?3, email = ?4 WHERE id = ?1",
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer.id).into());
        }

        Ok(())
    }

    /// Lists customers ordered by name, paged.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Searches customers by name or phone substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());

        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE name LIKE ?1 OR phone LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Extends store credit: raises the balance and appends a `credit`
    /// posting, in one transaction.
    ///
    /// The amount must be strictly positive; a "negative credit" is not a
    /// supported correction mechanism (use [`record_payment`] instead).
    ///
    /// [`record_payment`]: CustomerRepository::record_payment
    pub async fn add_credit(
        &self,
        customer_id: i64,
        amount_cents: i64,
        user_id: i64,
    ) -> PosResult<CreditTransaction> {
        validate_amount_cents(amount_cents).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            "UPDATE customers SET credit_balance_cents = credit_balance_cents + ?2 WHERE id = ?1",
        )
        .bind(customer_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::CustomerNotFound(customer_id).into());
        }

        let posting = insert_posting(
            &mut tx,
            customer_id,
            None,
            amount_cents,
            CreditEntryType::Credit,
        )
        .await?;

        activity::append_in_tx(
            &mut tx,
            user_id,
            &format!("Added credit for customer #{}: {}", customer_id, amount_cents),
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(customer_id = %customer_id, amount = %amount_cents, "Credit added");
        Ok(posting)
    }

    /// Records a payment against the balance: lowers the balance and appends
    /// a `payment` posting, in one transaction.
    ///
    /// Fails with [`CoreError::PaymentExceedsBalance`] when the amount is
    /// larger than the current balance; the balance is left unchanged.
    pub async fn record_payment(
        &self,
        customer_id: i64,
        amount_cents: i64,
        user_id: i64,
    ) -> PosResult<CreditTransaction> {
        validate_amount_cents(amount_cents).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // The guard is part of the UPDATE: the balance check and the
        // decrement are one statement, so concurrent payments cannot both
        // pass a stale check.
        let updated = sqlx::query(
            r#"
            UPDATE customers
            SET credit_balance_cents = credit_balance_cents - ?2
            WHERE id = ?1 AND credit_balance_cents >= ?2
            "#,
        )
        .bind(customer_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if updated.rows_affected() == 0 {
            let customer = sqlx::query_as::<_, Customer>(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
            ))
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from)?;

            return match customer {
                Some(c) => Err(CoreError::PaymentExceedsBalance {
                    requested: amount_cents,
                    balance: c.credit_balance_cents,
                }
                .into()),
                None => Err(CoreError::CustomerNotFound(customer_id).into()),
            };
        }

        let posting = insert_posting(
            &mut tx,
            customer_id,
            None,
            amount_cents,
            CreditEntryType::Payment,
        )
        .await?;

        activity::append_in_tx(
            &mut tx,
            user_id,
            &format!(
                "Recorded payment for customer #{}: {}",
                customer_id, amount_cents
            ),
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(customer_id = %customer_id, amount = %amount_cents, "Payment recorded");
        Ok(posting)
    }

    /// Lists a customer's ledger postings, newest first.
    pub async fn transactions_for(&self, customer_id: i64) -> DbResult<Vec<CreditTransaction>> {
        debug!(customer_id = %customer_id, "Fetching credit transactions");

        let postings = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, customer_id, sale_id, amount_cents, entry_type, created_at
            FROM credit_transactions
            WHERE customer_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(postings)
    }

    /// Lists a customer's sales, newest first.
    pub async fn sales_for(&self, customer_id: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, cashier_id, customer_id, subtotal_cents, discount_cents,
                   total_cents, payment_method, status, created_at
            FROM sales
            WHERE customer_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

/// Inserts a ledger posting inside a caller-owned transaction.
async fn insert_posting(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    customer_id: i64,
    sale_id: Option<i64>,
    amount_cents: i64,
    entry_type: CreditEntryType,
) -> PosResult<CreditTransaction> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO credit_transactions (customer_id, sale_id, amount_cents, entry_type, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(customer_id)
    .bind(sale_id)
    .bind(amount_cents)
    .bind(entry_type)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(DbError::from)?;

    Ok(CreditTransaction {
        id: result.last_insert_rowid(),
        customer_id,
        sale_id,
        amount_cents,
        entry_type,
        created_at: now,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
