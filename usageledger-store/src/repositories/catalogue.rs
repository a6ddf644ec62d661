//! Catalogue (C2): SKUs and their time-bounded prices.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use usageledger_core::error::{CatalogueError, CatalogueResult, StoreError};

use crate::models::{BillingItem, BillingItemPrice};
use crate::store::Store;

#[async_trait]
pub trait CatalogueRepository {
    async fn list_items(&self) -> CatalogueResult<Vec<BillingItem>>;
    async fn get_item(&self, sku: &str) -> CatalogueResult<Option<BillingItem>>;
    async fn ensure_sku(&self, sku: &str) -> CatalogueResult<()>;
    async fn upsert_item(
        &self,
        sku: &str,
        name: Option<&str>,
        unit: Option<&str>,
    ) -> CatalogueResult<()>;
    async fn current_prices(
        &self,
        at: DateTime<Utc>,
    ) -> CatalogueResult<Vec<(BillingItemPrice, String)>>;
    async fn upsert_price(
        &self,
        sku: &str,
        valid_from: DateTime<Utc>,
        price: Decimal,
    ) -> CatalogueResult<()>;
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<BillingItem, StoreError> {
    Ok(BillingItem {
        uuid: row.try_get("uuid").map_err(StoreError::Transient)?,
        sku: row.try_get("sku").map_err(StoreError::Transient)?,
        name: row.try_get("name").map_err(StoreError::Transient)?,
        unit: row.try_get("unit").map_err(StoreError::Transient)?,
    })
}

fn row_to_price(row: &sqlx::postgres::PgRow) -> Result<BillingItemPrice, StoreError> {
    Ok(BillingItemPrice {
        uuid: row.try_get("uuid").map_err(StoreError::Transient)?,
        item_id: row.try_get("item_id").map_err(StoreError::Transient)?,
        price: row.try_get("price").map_err(StoreError::Transient)?,
        valid_from: row.try_get("valid_from").map_err(StoreError::Transient)?,
        valid_until: row.try_get("valid_until").map_err(StoreError::Transient)?,
        configured_at: row.try_get("configured_at").map_err(StoreError::Transient)?,
    })
}

#[async_trait]
impl CatalogueRepository for Store {
    async fn list_items(&self) -> CatalogueResult<Vec<BillingItem>> {
        let rows = sqlx::query("SELECT uuid, sku, name, unit FROM billing_item ORDER BY sku ASC")
            .fetch_all(self.pool())
            .await
            .map_err(StoreError::Transient)?;

        rows.iter().map(row_to_item).map(|r| r.map_err(Into::into)).collect()
    }

    async fn get_item(&self, sku: &str) -> CatalogueResult<Option<BillingItem>> {
        let row = sqlx::query("SELECT uuid, sku, name, unit FROM billing_item WHERE sku = $1")
            .bind(sku)
            .fetch_optional(self.pool())
            .await
            .map_err(StoreError::Transient)?;

        row.as_ref().map(row_to_item).transpose().map_err(Into::into)
    }

    async fn ensure_sku(&self, sku: &str) -> CatalogueResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_item (uuid, sku, name, unit)
            VALUES ($1, $2, '', '')
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sku)
        .execute(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        Ok(())
    }

    async fn upsert_item(
        &self,
        sku: &str,
        name: Option<&str>,
        unit: Option<&str>,
    ) -> CatalogueResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_item (uuid, sku, name, unit)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (sku) DO UPDATE SET
                name = COALESCE($3, billing_item.name),
                unit = COALESCE($4, billing_item.unit)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sku)
        .bind(name.unwrap_or(""))
        .bind(unit.unwrap_or(""))
        .execute(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        Ok(())
    }

    async fn current_prices(
        &self,
        at: DateTime<Utc>,
    ) -> CatalogueResult<Vec<(BillingItemPrice, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT p.uuid, p.item_id, p.price, p.valid_from, p.valid_until, p.configured_at, i.sku
            FROM billing_item_price p
            JOIN billing_item i ON i.uuid = p.item_id
            WHERE p.valid_from <= $1 AND (p.valid_until IS NULL OR $1 < p.valid_until)
            ORDER BY i.sku ASC, p.valid_from ASC
            "#,
        )
        .bind(at)
        .fetch_all(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        rows.iter()
            .map(|row| {
                let price = row_to_price(row)?;
                let sku: String = row.try_get("sku").map_err(StoreError::Transient)?;
                Ok((price, sku))
            })
            .collect::<Result<Vec<_>, StoreError>>()
            .map_err(Into::into)
    }

    async fn upsert_price(
        &self,
        sku: &str,
        valid_from: DateTime<Utc>,
        price: Decimal,
    ) -> CatalogueResult<()> {
        let item = self.get_item(sku).await?.ok_or_else(|| CatalogueError::UnknownSku {
            sku: sku.to_string(),
        })?;

        let existing = sqlx::query(
            "SELECT uuid FROM billing_item_price WHERE item_id = $1 AND valid_from = $2",
        )
        .bind(item.uuid)
        .bind(valid_from)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        if let Some(row) = existing {
            let uuid: Uuid = row.try_get("uuid").map_err(StoreError::Transient)?;
            sqlx::query("UPDATE billing_item_price SET price = $1 WHERE uuid = $2")
                .bind(price)
                .bind(uuid)
                .execute(self.pool())
                .await
                .map_err(StoreError::Transient)?;
            return Ok(());
        }

        let head = sqlx::query(
            "SELECT uuid, valid_from FROM billing_item_price WHERE item_id = $1 ORDER BY valid_from DESC LIMIT 1",
        )
        .bind(item.uuid)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        if let Some(ref head_row) = head {
            let head_valid_from: DateTime<Utc> =
                head_row.try_get("valid_from").map_err(StoreError::Transient)?;

            if head_valid_from > valid_from {
                return Err(CatalogueError::PriceOutOfOrder {
                    sku: sku.to_string(),
                    valid_from: valid_from.to_rfc3339(),
                    head: head_valid_from.to_rfc3339(),
                });
            }
        }

        let mut tx = self.pool().begin().await.map_err(StoreError::Transient)?;

        if let Some(head_row) = head {
            let head_uuid: Uuid = head_row.try_get("uuid").map_err(StoreError::Transient)?;
            sqlx::query("UPDATE billing_item_price SET valid_until = $1 WHERE uuid = $2")
                .bind(valid_from)
                .bind(head_uuid)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::Transient)?;
        }

        sqlx::query(
            r#"
            INSERT INTO billing_item_price (uuid, item_id, price, valid_from, valid_until, configured_at)
            VALUES ($1, $2, $3, $4, NULL, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.uuid)
        .bind(price)
        .bind(valid_from)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Transient)?;

        tx.commit().await.map_err(StoreError::Transient)?;

        Ok(())
    }
}
