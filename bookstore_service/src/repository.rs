pub use in_memory_repository::{InMemoryDatabase, InMemoryRepository};
pub use postgres_repository::{PostgresConnection, PostgresRepository};

use crate::api::{Entity, EntityDetails, EntityId, Version};

mod in_memory_repository;
mod postgres_repository;

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("{kind} {id} was modified concurrently: saved with version {expected}, stored version is {actual}")]
    ConcurrencyConflict {
        kind: &'static str,
        id: EntityId,
        expected: Version,
        actual: Version,
    },

    #[error("Referenced {kind} {id} does not exist")]
    ReferenceNotFound { kind: &'static str, id: EntityId },

    #[error("{kind} {id} is still referenced by a {referrer}")]
    StillReferenced {
        kind: &'static str,
        id: EntityId,
        referrer: &'static str,
    },

    #[error("Failed to deserialize entity: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait Repository<T: EntityDetails>: Send + Sync {
    /// Retrieves the record with given id, None if there is no such record
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity<T>>, RepositoryError>;

    /// Lists all records ordered by id
    async fn find_all(&self) -> Result<Vec<Entity<T>>, RepositoryError>;

    /// Inserts a record without id, assigning a fresh id and version 0.
    /// A record with id replaces the stored one only if its version matches the stored version,
    /// the stored version is then incremented.
    /// The record `T::reference` points at is checked in the same step as the write,
    /// a missing one fails the save with `ReferenceNotFound`.
    async fn save(&self, entity: Entity<T>) -> Result<Entity<T>, RepositoryError>;

    /// Removes the record, returns false if it was not found.
    /// A record other records still point at is kept and `StillReferenced` is returned.
    async fn delete_by_id(&self, id: EntityId) -> Result<bool, RepositoryError>;
}
