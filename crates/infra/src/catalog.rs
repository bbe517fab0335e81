//! Product/service catalog sources.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::instrument;

use lumenr_core::UserId;
use lumenr_pricing::{Catalog, CatalogEntry, CatalogEntryId, ItemKind};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend failure: {0}")]
    Backend(String),
}

/// Loads the catalog an owner picks line items from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self, owner_id: UserId) -> Result<Catalog, CatalogError>;

    /// Add or replace an entry (matched by id) in the owner's catalog.
    async fn save(&self, owner_id: UserId, entry: CatalogEntry) -> Result<(), CatalogError>;
}

#[async_trait]
impl<T> CatalogSource for std::sync::Arc<T>
where
    T: CatalogSource + ?Sized,
{
    async fn load(&self, owner_id: UserId) -> Result<Catalog, CatalogError> {
        (**self).load(owner_id).await
    }

    async fn save(&self, owner_id: UserId, entry: CatalogEntry) -> Result<(), CatalogError> {
        (**self).save(owner_id, entry).await
    }
}

/// In-memory catalog, per owner. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<UserId, Vec<CatalogEntry>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry (matched by id) in the owner's catalog.
    pub fn upsert(&self, owner_id: UserId, entry: CatalogEntry) -> Result<(), CatalogError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CatalogError::Backend("lock poisoned".to_string()))?;

        let owned = entries.entry(owner_id).or_default();
        match owned.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => owned.push(entry),
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn load(&self, owner_id: UserId) -> Result<Catalog, CatalogError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CatalogError::Backend("lock poisoned".to_string()))?;

        Ok(Catalog::new(
            entries.get(&owner_id).cloned().unwrap_or_default(),
        ))
    }

    async fn save(&self, owner_id: UserId, entry: CatalogEntry) -> Result<(), CatalogError> {
        self.upsert(owner_id, entry)
    }
}

/// Catalog backed by the `catalog_entries` table.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogSource for PostgresCatalog {
    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn load(&self, owner_id: UserId) -> Result<Catalog, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, name, description, unit_price, active
            FROM catalog_entries
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Backend(format!("load_catalog: {e}")))?;

        let entries = rows
            .iter()
            .map(|row| decode_entry(row).map_err(|e| CatalogError::Backend(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Catalog::new(entries))
    }

    #[instrument(skip(self, entry), fields(owner_id = %owner_id, entry_id = %entry.id), err)]
    async fn save(&self, owner_id: UserId, entry: CatalogEntry) -> Result<(), CatalogError> {
        let result = sqlx::query(
            r#"
            INSERT INTO catalog_entries (id, owner_id, kind, name, description, unit_price, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET kind = EXCLUDED.kind,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                unit_price = EXCLUDED.unit_price,
                active = EXCLUDED.active
            WHERE catalog_entries.owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(entry.kind.to_string())
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(entry.unit_price)
        .bind(entry.active)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Backend(format!("save_catalog_entry: {e}")))?;

        // An id taken by another owner's entry leaves the row untouched.
        if result.rows_affected() == 0 {
            return Err(CatalogError::Backend(format!(
                "catalog entry {} belongs to another owner",
                entry.id
            )));
        }
        Ok(())
    }
}

fn decode_entry(row: &sqlx::postgres::PgRow) -> Result<CatalogEntry, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let kind = ItemKind::from_str(&kind).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(CatalogEntry {
        id: CatalogEntryId::from_uuid(row.try_get("id")?),
        kind,
        name: row.try_get("name")?,
        description: row.try_get::<Option<String>, _>("description")?.unwrap_or_default(),
        unit_price: row.try_get::<Decimal, _>("unit_price")?,
        active: row.try_get("active")?,
    })
}
