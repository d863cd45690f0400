use std::sync::Arc;

use crate::api::{
    Author, AuthorDetails, Book, BookDetails, Buy, BuyDetails, Entity, EntityDetails, EntityId,
    SaveAuthorRequest, SaveBookRequest, SaveBuyRequest, Version,
};
use crate::repository::{InMemoryDatabase, InMemoryRepository, Repository, RepositoryError};

#[derive(thiserror::Error, Debug)]
pub enum BookstoreError {
    #[error("Missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("Referenced {kind} {id} does not exist")]
    ReferenceNotFound { kind: &'static str, id: EntityId },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("{kind} {id} is still referenced by a {referrer}")]
    StillReferenced {
        kind: &'static str,
        id: EntityId,
        referrer: &'static str,
    },

    #[error("{kind} {id} was modified concurrently: saved with version {expected}, stored version is {actual}")]
    ConcurrencyConflict {
        kind: &'static str,
        id: EntityId,
        expected: Version,
        actual: Version,
    },

    #[error("Repository failure: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for BookstoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepositoryError::ReferenceNotFound { kind, id } => Self::ReferenceNotFound { kind, id },
            RepositoryError::StillReferenced { kind, id, referrer } => {
                Self::StillReferenced { kind, id, referrer }
            }
            RepositoryError::ConcurrencyConflict {
                kind,
                id,
                expected,
                actual,
            } => Self::ConcurrencyConflict {
                kind,
                id,
                expected,
                actual,
            },
            other => Self::Repository(other),
        }
    }
}

/// Collects names of required fields absent from a request
#[derive(Default)]
struct RequiredFields {
    missing: Vec<&'static str>,
}

impl RequiredFields {
    fn value<V>(&mut self, name: &'static str, value: Option<V>) -> Option<V> {
        if value.is_none() {
            self.missing.push(name);
        }
        value
    }

    /// Blank text counts as missing
    fn text(&mut self, name: &'static str, value: Option<String>) -> Option<String> {
        self.value(name, value.filter(|text| !text.trim().is_empty()))
    }

    /// A request with an id replaces the stored record and has to say which version it read.
    /// A version alone does not identify a record and is reported as a missing id.
    fn identity(
        &mut self,
        id: Option<EntityId>,
        version: Option<Version>,
    ) -> Option<(EntityId, Version)> {
        match (id, version) {
            (None, None) => None,
            (None, Some(_)) => {
                self.missing.push("id");
                None
            }
            (Some(id), version) => self.value("version", version).map(|version| (id, version)),
        }
    }

    fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    fn into_error(self) -> BookstoreError {
        BookstoreError::Validation(self.missing)
    }
}

fn entity<T>(identity: Option<(EntityId, Version)>, details: T) -> Entity<T> {
    match identity {
        Some((id, version)) => Entity::with_identity(id, version, details),
        None => Entity::new(details),
    }
}

/// Maps requests onto repository calls.
/// References between records are checked by the repositories together with the write.
pub struct Bookstore {
    authors: Arc<dyn Repository<AuthorDetails>>,
    books: Arc<dyn Repository<BookDetails>>,
    buys: Arc<dyn Repository<BuyDetails>>,
}

impl Bookstore {
    pub fn new(
        authors: Arc<dyn Repository<AuthorDetails>>,
        books: Arc<dyn Repository<BookDetails>>,
        buys: Arc<dyn Repository<BuyDetails>>,
    ) -> Self {
        Self {
            authors,
            books,
            buys,
        }
    }

    pub fn in_memory() -> Self {
        let database = InMemoryDatabase::default();
        Self::new(
            Arc::new(InMemoryRepository::<AuthorDetails>::new(database.clone())),
            Arc::new(InMemoryRepository::<BookDetails>::new(database.clone())),
            Arc::new(InMemoryRepository::<BuyDetails>::new(database)),
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_author(&self, id: EntityId) -> Result<Author, BookstoreError> {
        find(self.authors.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_authors(&self) -> Result<Vec<Author>, BookstoreError> {
        Ok(self.authors.find_all().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn save_author(&self, request: SaveAuthorRequest) -> Result<Author, BookstoreError> {
        let mut required = RequiredFields::default();
        let identity = required.identity(request.id, request.version);
        let name = required.text("name", request.name);
        let last_name = required.text("lastName", request.last_name);

        let details = match (name, last_name) {
            (Some(name), Some(last_name)) if required.is_complete() => AuthorDetails {
                name,
                last_name,
                email: request.email,
                phone: request.phone,
            },
            _ => return Err(required.into_error()),
        };

        save(self.authors.as_ref(), entity(identity, details)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_author(&self, id: EntityId) -> Result<(), BookstoreError> {
        delete(self.authors.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_book(&self, id: EntityId) -> Result<Book, BookstoreError> {
        find(self.books.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Vec<Book>, BookstoreError> {
        Ok(self.books.find_all().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn save_book(&self, request: SaveBookRequest) -> Result<Book, BookstoreError> {
        let mut required = RequiredFields::default();
        let identity = required.identity(request.id, request.version);
        let title = required.text("title", request.title);
        let author_id = required.value("idAuthor", request.id_author);

        let (title, author_id) = match (title, author_id) {
            (Some(title), Some(author_id)) if required.is_complete() => (title, author_id),
            _ => return Err(required.into_error()),
        };
        let details = BookDetails {
            title,
            publisher: request.publisher,
            year: request.year,
            price: request.price,
            author_id,
        };

        save(self.books.as_ref(), entity(identity, details)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, id: EntityId) -> Result<(), BookstoreError> {
        delete(self.books.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_buy(&self, id: EntityId) -> Result<Buy, BookstoreError> {
        find(self.buys.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_buys(&self) -> Result<Vec<Buy>, BookstoreError> {
        Ok(self.buys.find_all().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn save_buy(&self, request: SaveBuyRequest) -> Result<Buy, BookstoreError> {
        let mut required = RequiredFields::default();
        let identity = required.identity(request.id, request.version);
        let amount = required.value("amount", request.amount);
        let price = required.value("price", request.price);

        let (amount, price) = match (amount, price) {
            (Some(amount), Some(price)) if required.is_complete() => (amount, price),
            _ => return Err(required.into_error()),
        };
        let details = BuyDetails {
            amount,
            description: request.description,
            price,
            book_id: request.id_book,
        };

        save(self.buys.as_ref(), entity(identity, details)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_buy(&self, id: EntityId) -> Result<(), BookstoreError> {
        delete(self.buys.as_ref(), id).await
    }
}

async fn find<T: EntityDetails>(
    repository: &dyn Repository<T>,
    id: EntityId,
) -> Result<Entity<T>, BookstoreError> {
    repository
        .find_by_id(id)
        .await?
        .ok_or(BookstoreError::NotFound { kind: T::KIND, id })
}

async fn save<T: EntityDetails>(
    repository: &dyn Repository<T>,
    entity: Entity<T>,
) -> Result<Entity<T>, BookstoreError> {
    let saved = repository.save(entity).await?;
    tracing::info!(kind = T::KIND, id = ?saved.id, version = saved.version, "Saved");
    Ok(saved)
}

/// Deleting a record that does not exist is not an error, deleting one that is still referenced is
async fn delete<T: EntityDetails>(
    repository: &dyn Repository<T>,
    id: EntityId,
) -> Result<(), BookstoreError> {
    if repository.delete_by_id(id).await? {
        tracing::info!(kind = T::KIND, id, "Deleted");
    } else {
        tracing::debug!(kind = T::KIND, id, "Nothing to delete");
    }
    Ok(())
}
