//! Client directory: the location data used to resolve a client's tax rate.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::instrument;

use lumenr_core::{ClientId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub province: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientDirectoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("client directory backend failure: {0}")]
    Backend(String),
}

/// Owner-scoped client lookup. A client of another owner is not found.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn find(
        &self,
        owner_id: UserId,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, ClientDirectoryError>;

    async fn list(&self, owner_id: UserId) -> Result<Vec<ClientProfile>, ClientDirectoryError>;

    /// Add or replace a client (matched by id).
    async fn register(
        &self,
        owner_id: UserId,
        profile: ClientProfile,
    ) -> Result<(), ClientDirectoryError>;
}

fn validate_profile(profile: &ClientProfile) -> Result<(), ClientDirectoryError> {
    if profile.name.trim().is_empty() {
        return Err(ClientDirectoryError::Validation(
            "client name is required".to_string(),
        ));
    }
    if profile.country.trim().is_empty() {
        return Err(ClientDirectoryError::Validation(
            "client country is required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryClientDirectory {
    clients: RwLock<HashMap<UserId, Vec<ClientProfile>>>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous form of [`ClientDirectory::register`].
    pub fn insert(&self, owner_id: UserId, profile: ClientProfile) -> Result<(), ClientDirectoryError> {
        validate_profile(&profile)?;

        let mut clients = self
            .clients
            .write()
            .map_err(|_| ClientDirectoryError::Backend("lock poisoned".to_string()))?;

        let owned = clients.entry(owner_id).or_default();
        match owned.iter_mut().find(|c| c.id == profile.id) {
            Some(existing) => *existing = profile,
            None => owned.push(profile),
        }
        Ok(())
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn find(
        &self,
        owner_id: UserId,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, ClientDirectoryError> {
        let clients = self
            .clients
            .read()
            .map_err(|_| ClientDirectoryError::Backend("lock poisoned".to_string()))?;

        Ok(clients
            .get(&owner_id)
            .and_then(|owned| owned.iter().find(|c| c.id == client_id))
            .cloned())
    }

    async fn list(&self, owner_id: UserId) -> Result<Vec<ClientProfile>, ClientDirectoryError> {
        let clients = self
            .clients
            .read()
            .map_err(|_| ClientDirectoryError::Backend("lock poisoned".to_string()))?;

        Ok(clients.get(&owner_id).cloned().unwrap_or_default())
    }

    async fn register(
        &self,
        owner_id: UserId,
        profile: ClientProfile,
    ) -> Result<(), ClientDirectoryError> {
        self.insert(owner_id, profile)
    }
}

/// Directory backed by the `clients` table.
#[derive(Debug, Clone)]
pub struct PostgresClientDirectory {
    pool: PgPool,
}

impl PostgresClientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientDirectory for PostgresClientDirectory {
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id), err)]
    async fn find(
        &self,
        owner_id: UserId,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, ClientDirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, country, province
            FROM clients
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(client_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ClientDirectoryError::Backend(format!("find_client: {e}")))?;

        row.as_ref()
            .map(decode_profile)
            .transpose()
            .map_err(|e| ClientDirectoryError::Backend(e.to_string()))
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn list(&self, owner_id: UserId) -> Result<Vec<ClientProfile>, ClientDirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, country, province
            FROM clients
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ClientDirectoryError::Backend(format!("list_clients: {e}")))?;

        rows.iter()
            .map(|row| decode_profile(row).map_err(|e| ClientDirectoryError::Backend(e.to_string())))
            .collect()
    }

    #[instrument(skip(self, profile), fields(owner_id = %owner_id, client_id = %profile.id), err)]
    async fn register(
        &self,
        owner_id: UserId,
        profile: ClientProfile,
    ) -> Result<(), ClientDirectoryError> {
        validate_profile(&profile)?;

        let result = sqlx::query(
            r#"
            INSERT INTO clients (id, owner_id, name, country, province)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                country = EXCLUDED.country,
                province = EXCLUDED.province
            WHERE clients.owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(&profile.name)
        .bind(&profile.country)
        .bind(profile.province.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| ClientDirectoryError::Backend(format!("register_client: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(ClientDirectoryError::Backend(format!(
                "client {} belongs to another owner",
                profile.id
            )));
        }
        Ok(())
    }
}

fn decode_profile(row: &sqlx::postgres::PgRow) -> Result<ClientProfile, sqlx::Error> {
    Ok(ClientProfile {
        id: ClientId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        province: row.try_get("province")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(province: Option<&str>) -> ClientProfile {
        ClientProfile {
            id: ClientId::new(),
            name: "Maple Roofing".to_string(),
            country: "CA".to_string(),
            province: province.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn clients_of_other_owners_are_not_found() {
        let directory = InMemoryClientDirectory::new();
        let owner = UserId::new();
        let client = profile(Some("ON"));
        directory.register(owner, client.clone()).await.unwrap();

        assert_eq!(
            directory.find(owner, client.id).await.unwrap(),
            Some(client.clone())
        );
        assert_eq!(directory.find(UserId::new(), client.id).await.unwrap(), None);
        assert!(directory.list(UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_replaces_by_id() {
        let directory = InMemoryClientDirectory::new();
        let owner = UserId::new();
        let mut client = profile(Some("ON"));
        directory.register(owner, client.clone()).await.unwrap();

        client.province = Some("QC".to_string());
        directory.register(owner, client.clone()).await.unwrap();

        assert_eq!(directory.list(owner).await.unwrap(), vec![client]);
    }

    #[tokio::test]
    async fn register_requires_name_and_country() {
        let directory = InMemoryClientDirectory::new();
        let mut client = profile(None);
        client.country = " ".to_string();

        assert!(matches!(
            directory.register(UserId::new(), client).await,
            Err(ClientDirectoryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn works_through_the_trait_object() {
        let directory: std::sync::Arc<dyn ClientDirectory> =
            std::sync::Arc::new(InMemoryClientDirectory::new());
        let owner = UserId::new();
        let client = profile(None);

        directory.register(owner, client.clone()).await.unwrap();

        assert_eq!(directory.find(owner, client.id).await.unwrap(), Some(client));
    }
}
