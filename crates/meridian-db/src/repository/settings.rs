//! # Business Settings Repository
//!
//! Store-wide configuration, kept as a single row that is created with
//! defaults on first read.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult, PosResult};
use meridian_core::BusinessSettings;

const SETTINGS_COLUMNS: &str = "id, business_name, currency, address, contact, contact_email, \
     low_stock_alerts, created_at, updated_at";

/// Repository for business settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Gets the settings row, creating the default row if none exists yet.
    pub async fn get(&self) -> DbResult<BusinessSettings> {
        if let Some(settings) = sqlx::query_as::<_, BusinessSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM business_settings ORDER BY id LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(settings);
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO business_settings (created_at, updated_at) VALUES (?1, ?1)",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!("Business settings initialized with defaults");

        Ok(BusinessSettings {
            id: result.last_insert_rowid(),
            business_name: "Meridian POS".to_string(),
            currency: "GHS".to_string(),
            address: None,
            contact: None,
            contact_email: None,
            low_stock_alerts: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Updates the settings row.
    pub async fn update(&self, settings: &BusinessSettings) -> PosResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE business_settings SET
                business_name = ?2,
                currency = ?3,
                address = ?4,
                contact = ?5,
                contact_email = ?6,
                low_stock_alerts = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(settings.id)
        .bind(&settings.business_name)
        .bind(&settings.currency)
        .bind(&settings.address)
        .bind(&settings.contact)
        .bind(&settings.contact_email)
        .bind(settings.low_stock_alerts)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BusinessSettings", settings.id).into());
        }

        Ok(())
    }
}
