use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row, Statement, Transaction};

use crate::api::{Entity, EntityDetails, EntityId, Reference, Version};
use crate::repository::{Repository, RepositoryError};
use crate::settings::DatabaseSettings;

/// Connection shared by all postgres repositories
#[derive(Clone)]
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
}

impl PostgresConnection {
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}:{}/{}",
            settings.username, settings.password, settings.hostname, settings.port, settings.dbname
        );
        tracing::info!(
            hostname = %settings.hostname,
            port = settings.port,
            dbname = %settings.dbname,
            "Connecting to postgres"
        );
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Runs `operation` inside a transaction.
    /// The transaction is committed only when the operation succeeds, otherwise it is rolled back on drop.
    pub async fn with_transaction<R, F>(&self, operation: F) -> Result<R, RepositoryError>
    where
        R: Send,
        F: for<'t> FnOnce(&'t Transaction<'t>) -> BoxFuture<'t, Result<R, RepositoryError>>
            + Send,
    {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let result = operation(&transaction).await?;
        transaction.commit().await?;
        Ok(result)
    }
}

pub struct PostgresRepository<T> {
    connection: PostgresConnection,
    _details: PhantomData<fn() -> T>,
}

impl<T: EntityDetails> PostgresRepository<T> {
    /// Creates a repository over `T::TABLE`, creating the table first when `create_schema` is set
    pub async fn init(connection: PostgresConnection, create_schema: bool) -> anyhow::Result<Self> {
        if create_schema {
            connection
                .client
                .lock()
                .await
                .batch_execute(&format!(
                    "
        CREATE TABLE IF NOT EXISTS {} (
            id              BIGSERIAL PRIMARY KEY,
            version         INTEGER NOT NULL DEFAULT 0,
            params          JSONB NOT NULL
            )
        ",
                    T::TABLE
                ))
                .await
                .with_context(|| format!("Failed to setup {} table", T::TABLE))?;
        }

        Ok(Self {
            connection,
            _details: PhantomData,
        })
    }
}

fn entity_from_row<T: EntityDetails>(row: &Row) -> Result<Entity<T>, RepositoryError> {
    let id: EntityId = row.try_get(0)?;
    let version: Version = row.try_get(1)?;
    let details: serde_json::Value = row.try_get(2)?;
    Ok(Entity::with_identity(
        id,
        version,
        serde_json::from_value(details)?,
    ))
}

/// Fails when the referenced row is missing, otherwise keeps it locked against deletes until the transaction ends
async fn lock_reference(
    transaction: &Transaction<'_>,
    reference: Option<Reference>,
) -> Result<(), RepositoryError> {
    let Some(reference) = reference else {
        return Ok(());
    };
    let stmt: Statement = transaction
        .prepare(&format!(
            "SELECT id FROM {} WHERE id = ($1) FOR KEY SHARE",
            reference.table
        ))
        .await?;
    if transaction.query(&stmt, &[&reference.id]).await?.is_empty() {
        return Err(RepositoryError::ReferenceNotFound {
            kind: reference.kind,
            id: reference.id,
        });
    }
    Ok(())
}

#[async_trait::async_trait]
impl<T: EntityDetails> Repository<T> for PostgresRepository<T> {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity<T>>, RepositoryError> {
        let client = self.connection.client.lock().await;
        let stmt: Statement = client
            .prepare(&format!(
                "SELECT id, version, params FROM {} WHERE id = ($1)",
                T::TABLE
            ))
            .await?;

        let rows = client.query(&stmt, &[&id]).await?;

        rows.first().map(entity_from_row::<T>).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Entity<T>>, RepositoryError> {
        let client = self.connection.client.lock().await;
        let stmt: Statement = client
            .prepare(&format!(
                "SELECT id, version, params FROM {} ORDER BY id",
                T::TABLE
            ))
            .await?;

        let rows = client.query(&stmt, &[]).await?;

        rows.iter().map(entity_from_row::<T>).collect()
    }

    async fn save(&self, entity: Entity<T>) -> Result<Entity<T>, RepositoryError> {
        let params = serde_json::to_value(&entity.details)?;
        let reference = entity.details.reference();
        let expected_version = entity.version;
        let table = T::TABLE;
        let kind = T::KIND;

        let (id, version) = match entity.id {
            None => {
                self.connection
                    .with_transaction(move |transaction| {
                        Box::pin(async move {
                            lock_reference(transaction, reference).await?;
                            let stmt: Statement = transaction
                                .prepare(&format!(
                                    "INSERT INTO {table} (version, params) VALUES (0, $1) RETURNING id, version"
                                ))
                                .await?;
                            let rows = transaction.query(&stmt, &[&params]).await?;
                            let row = rows.first().ok_or_else(|| {
                                RepositoryError::Other("Id not returned".to_string())
                            })?;
                            Ok::<_, RepositoryError>((
                                row.try_get::<_, EntityId>(0)?,
                                row.try_get::<_, Version>(1)?,
                            ))
                        })
                    })
                    .await?
            }
            Some(id) => {
                self.connection
                    .with_transaction(move |transaction| {
                        Box::pin(async move {
                            lock_reference(transaction, reference).await?;
                            let stmt: Statement = transaction
                                .prepare(&format!(
                                    "UPDATE {table} SET params = ($1), version = version + 1 \
                                     WHERE id = ($2) AND version = ($3) RETURNING version"
                                ))
                                .await?;
                            let rows = transaction
                                .query(&stmt, &[&params, &id, &expected_version])
                                .await?;
                            if let Some(row) = rows.first() {
                                return Ok::<_, RepositoryError>((id, row.try_get::<_, Version>(0)?));
                            }

                            // Nothing updated, either the record is gone or somebody saved it first
                            let stmt: Statement = transaction
                                .prepare(&format!("SELECT version FROM {table} WHERE id = ($1)"))
                                .await?;
                            let rows = transaction.query(&stmt, &[&id]).await?;
                            match rows.first() {
                                Some(row) => Err(RepositoryError::ConcurrencyConflict {
                                    kind,
                                    id,
                                    expected: expected_version,
                                    actual: row.try_get(0)?,
                                }),
                                None => Err(RepositoryError::NotFound { kind, id }),
                            }
                        })
                    })
                    .await?
            }
        };

        Ok(Entity::with_identity(id, version, entity.details))
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<bool, RepositoryError> {
        let table = T::TABLE;
        let kind = T::KIND;
        self.connection
            .with_transaction(move |transaction| {
                Box::pin(async move {
                    // Row lock first, a save referencing it either finished already or waits for this delete
                    let stmt: Statement = transaction
                        .prepare(&format!("SELECT id FROM {table} WHERE id = ($1) FOR UPDATE"))
                        .await?;
                    if transaction.query(&stmt, &[&id]).await?.is_empty() {
                        return Ok(false);
                    }

                    for referrer in T::REFERRERS {
                        let stmt: Statement = transaction
                            .prepare(&format!(
                                "SELECT id FROM {} WHERE (params->>'{}')::BIGINT = ($1) LIMIT 1",
                                referrer.table, referrer.field
                            ))
                            .await?;
                        if !transaction.query(&stmt, &[&id]).await?.is_empty() {
                            return Err(RepositoryError::StillReferenced {
                                kind,
                                id,
                                referrer: referrer.kind,
                            });
                        }
                    }

                    let stmt: Statement = transaction
                        .prepare(&format!("DELETE FROM {table} WHERE id = ($1) RETURNING id"))
                        .await?;
                    let rows = transaction.query(&stmt, &[&id]).await?;
                    Ok::<_, RepositoryError>(!rows.is_empty())
                })
            })
            .await
    }
}
