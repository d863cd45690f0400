use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{Entity, EntityDetails, EntityId, Referrer, Version};
use crate::repository::{Repository, RepositoryError};

struct StoredRecord {
    version: Version,
    params: Value,
}

#[derive(Default)]
struct Table {
    last_id: EntityId,
    records: BTreeMap<EntityId, StoredRecord>,
}

type Tables = HashMap<&'static str, Table>;

/// Tables shared by the in-memory repositories.
/// Writes hold the one lock over all tables, so a reference check and the write it guards happen together.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<parking_lot::RwLock<Tables>>,
}

pub struct InMemoryRepository<T> {
    database: InMemoryDatabase,
    _details: PhantomData<fn() -> T>,
}

impl<T> InMemoryRepository<T> {
    pub fn new(database: InMemoryDatabase) -> Self {
        Self {
            database,
            _details: PhantomData,
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new(InMemoryDatabase::default())
    }
}

fn entity_from_record<T: EntityDetails>(
    id: EntityId,
    record: &StoredRecord,
) -> Result<Entity<T>, RepositoryError> {
    Ok(Entity::with_identity(
        id,
        record.version,
        serde_json::from_value(record.params.clone())?,
    ))
}

fn contains(tables: &Tables, table: &str, id: EntityId) -> bool {
    tables
        .get(table)
        .is_some_and(|table| table.records.contains_key(&id))
}

/// Kind of the first record found pointing at `id`
fn find_referrer(tables: &Tables, referrers: &[Referrer], id: EntityId) -> Option<&'static str> {
    referrers
        .iter()
        .find(|referrer| {
            tables.get(referrer.table).is_some_and(|table| {
                table
                    .records
                    .values()
                    .any(|record| record.params.get(referrer.field).and_then(Value::as_i64) == Some(id))
            })
        })
        .map(|referrer| referrer.kind)
}

#[async_trait::async_trait]
impl<T: EntityDetails> Repository<T> for InMemoryRepository<T> {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity<T>>, RepositoryError> {
        let tables = self.database.tables.read();
        tables
            .get(T::TABLE)
            .and_then(|table| table.records.get(&id))
            .map(|record| entity_from_record(id, record))
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<Entity<T>>, RepositoryError> {
        let tables = self.database.tables.read();
        match tables.get(T::TABLE) {
            Some(table) => table
                .records
                .iter()
                .map(|(id, record)| entity_from_record(*id, record))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, entity: Entity<T>) -> Result<Entity<T>, RepositoryError> {
        let params = serde_json::to_value(&entity.details)?;
        let mut locked_tables = self.database.tables.write();

        if let Some(reference) = entity.details.reference() {
            if !contains(&locked_tables, reference.table, reference.id) {
                return Err(RepositoryError::ReferenceNotFound {
                    kind: reference.kind,
                    id: reference.id,
                });
            }
        }

        let table = locked_tables.entry(T::TABLE).or_default();
        let Some(id) = entity.id else {
            // ids start from 1 like database sequences do
            table.last_id += 1;
            let id = table.last_id;
            table.records.insert(id, StoredRecord { version: 0, params });
            return Ok(Entity::with_identity(id, 0, entity.details));
        };

        match table.records.get_mut(&id) {
            None => Err(RepositoryError::NotFound { kind: T::KIND, id }),
            Some(current) if current.version != entity.version => {
                Err(RepositoryError::ConcurrencyConflict {
                    kind: T::KIND,
                    id,
                    expected: entity.version,
                    actual: current.version,
                })
            }
            Some(current) => {
                current.params = params;
                current.version += 1;
                Ok(Entity::with_identity(id, current.version, entity.details))
            }
        }
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<bool, RepositoryError> {
        let mut locked_tables = self.database.tables.write();
        if !contains(&locked_tables, T::TABLE, id) {
            return Ok(false);
        }
        if let Some(referrer) = find_referrer(&locked_tables, T::REFERRERS, id) {
            return Err(RepositoryError::StillReferenced {
                kind: T::KIND,
                id,
                referrer,
            });
        }
        Ok(locked_tables
            .get_mut(T::TABLE)
            .and_then(|table| table.records.remove(&id))
            .is_some())
    }
}

#[cfg(test)]
mod in_memory_repository_tests {
    use std::sync::Arc;

    use crate::api::{Author, AuthorDetails, Book, BookDetails, Buy, BuyDetails};
    use crate::repository::{InMemoryDatabase, InMemoryRepository, Repository, RepositoryError};

    fn john_doe() -> AuthorDetails {
        AuthorDetails {
            name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: Some("test@test.com".to_string()),
            phone: Some("000-000-0000".to_string()),
        }
    }

    #[tokio::test]
    /// Tests if save assigns an id and find_by_id returns the stored record
    async fn test_save_and_find_it() {
        let repo = InMemoryRepository::<AuthorDetails>::default();

        assert_eq!(repo.find_by_id(20000).await.unwrap(), None);

        let saved = repo
            .save(Author::new(john_doe()))
            .await
            .expect("Failed to save author");
        assert_eq!(saved.id, Some(1));
        assert_eq!(saved.version, 0);

        let found = repo
            .find_by_id(1)
            .await
            .expect("Failed to find author")
            .expect("Author not found");
        assert_eq!(found, saved);
        assert_eq!(found.details, john_doe());
    }

    #[tokio::test]
    /// Tests if find_all lists records in id order
    async fn test_save_and_list_them() {
        let repo = InMemoryRepository::<AuthorDetails>::default();
        assert_eq!(repo.find_all().await.unwrap(), vec![]);

        let first = repo.save(Author::new(john_doe())).await.unwrap();
        let second = repo
            .save(Author::new(AuthorDetails {
                name: "Jane".to_string(),
                ..john_doe()
            }))
            .await
            .unwrap();

        assert_eq!(repo.find_all().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    /// Replace-save bumps the version, a save holding the old version is rejected
    async fn test_replace_with_version_check() {
        let repo = InMemoryRepository::<AuthorDetails>::default();
        let saved = repo.save(Author::new(john_doe())).await.unwrap();
        let id = saved.id.unwrap();

        let updated = repo
            .save(Author::with_identity(
                id,
                saved.version,
                AuthorDetails {
                    email: None,
                    ..john_doe()
                },
            ))
            .await
            .expect("Failed to replace author");
        assert_eq!(updated.version, 1);
        assert_eq!(updated.details.email, None);

        let stale = repo.save(saved.clone()).await;
        assert!(matches!(
            stale,
            Err(RepositoryError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert_eq!(repo.find_by_id(id).await.unwrap(), Some(updated));

        let unknown = repo.save(Author::with_identity(999, 0, john_doe())).await;
        assert!(matches!(unknown, Err(RepositoryError::NotFound { id: 999, .. })));
    }

    #[tokio::test]
    /// Two writers holding the same version race, exactly one of them wins
    async fn test_concurrent_saves_with_same_version() {
        let repo = Arc::new(InMemoryRepository::<AuthorDetails>::default());
        let saved = repo.save(Author::new(john_doe())).await.unwrap();
        let id = saved.id.unwrap();

        let first = {
            let repo = repo.clone();
            let entity = Author::with_identity(
                id,
                saved.version,
                AuthorDetails {
                    name: "First".to_string(),
                    ..john_doe()
                },
            );
            tokio::spawn(async move { repo.save(entity).await })
        };
        let second = {
            let repo = repo.clone();
            let entity = Author::with_identity(
                id,
                saved.version,
                AuthorDetails {
                    name: "Second".to_string(),
                    ..john_doe()
                },
            );
            tokio::spawn(async move { repo.save(entity).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(RepositoryError::ConcurrencyConflict { .. })))
                .count(),
            1
        );
        assert_eq!(repo.find_by_id(id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRepository::<AuthorDetails>::default();
        let saved = repo.save(Author::new(john_doe())).await.unwrap();
        let id = saved.id.unwrap();

        assert!(repo.delete_by_id(id).await.unwrap());
        assert!(!repo.delete_by_id(id).await.unwrap());
        assert_eq!(repo.find_by_id(id).await.unwrap(), None);

        // ids are never reused
        let next = repo.save(Author::new(john_doe())).await.unwrap();
        assert_eq!(next.id, Some(id + 1));
    }

    fn book_of(author_id: i64) -> BookDetails {
        BookDetails {
            title: "The Book".to_string(),
            publisher: None,
            year: Some(2001),
            price: Some(19.99),
            author_id,
        }
    }

    #[tokio::test]
    /// A save pointing at a missing record is rejected, also when replacing
    async fn test_save_checks_reference() {
        let database = InMemoryDatabase::default();
        let authors = InMemoryRepository::<AuthorDetails>::new(database.clone());
        let books = InMemoryRepository::<BookDetails>::new(database);

        let missing = books.save(Book::new(book_of(1))).await;
        assert!(matches!(
            missing,
            Err(RepositoryError::ReferenceNotFound { kind: "Author", id: 1 })
        ));
        assert!(books.find_all().await.unwrap().is_empty());

        let author = authors.save(Author::new(john_doe())).await.unwrap();
        let book = books
            .save(Book::new(book_of(author.id.unwrap())))
            .await
            .expect("Failed to save book");

        let moved = books
            .save(Book::with_identity(book.id.unwrap(), book.version, book_of(42)))
            .await;
        assert!(matches!(
            moved,
            Err(RepositoryError::ReferenceNotFound { kind: "Author", id: 42 })
        ));
        assert_eq!(books.find_by_id(book.id.unwrap()).await.unwrap(), Some(book));
    }

    #[tokio::test]
    /// A referenced record stays until its referrers are gone
    async fn test_delete_referenced_record() {
        let database = InMemoryDatabase::default();
        let authors = InMemoryRepository::<AuthorDetails>::new(database.clone());
        let books = InMemoryRepository::<BookDetails>::new(database.clone());
        let buys = InMemoryRepository::<BuyDetails>::new(database);

        let author = authors.save(Author::new(john_doe())).await.unwrap();
        let author_id = author.id.unwrap();
        let book = books.save(Book::new(book_of(author_id))).await.unwrap();
        let book_id = book.id.unwrap();
        let buy = buys
            .save(Buy::new(BuyDetails {
                amount: 1.0,
                description: None,
                price: 19.99,
                book_id: Some(book_id),
            }))
            .await
            .unwrap();

        assert!(matches!(
            authors.delete_by_id(author_id).await,
            Err(RepositoryError::StillReferenced {
                kind: "Author",
                referrer: "Book",
                ..
            })
        ));
        assert!(matches!(
            books.delete_by_id(book_id).await,
            Err(RepositoryError::StillReferenced {
                kind: "Book",
                referrer: "Buy",
                ..
            })
        ));
        assert_eq!(authors.find_by_id(author_id).await.unwrap(), Some(author));
        assert_eq!(books.find_by_id(book_id).await.unwrap(), Some(book));

        assert!(buys.delete_by_id(buy.id.unwrap()).await.unwrap());
        assert!(books.delete_by_id(book_id).await.unwrap());
        assert!(authors.delete_by_id(author_id).await.unwrap());
    }
}
