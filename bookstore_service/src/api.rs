use paperclip::actix::Apiv2Schema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub type EntityId = i64;
pub type Version = i32;

/// Details of a single kind of record, stored and returned together with its identity
pub trait EntityDetails: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the kind used in errors and logs
    const KIND: &'static str;
    /// Table holding records of this kind
    const TABLE: &'static str;
    /// Kinds whose records point at records of this kind
    const REFERRERS: &'static [Referrer] = &[];

    /// Record this one points at, it has to exist for as long as this record does
    fn reference(&self) -> Option<Reference> {
        None
    }
}

/// Pointer from a record to the record it depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: &'static str,
    pub table: &'static str,
    pub id: EntityId,
}

/// Field through which records of another kind point at a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer {
    pub kind: &'static str,
    pub table: &'static str,
    /// Name of the id field in the serialized details
    pub field: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A persisted record: identity assigned by the repository, version bumped on every update
pub struct Entity<T> {
    /// None until the record is saved for the first time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub version: Version,
    #[serde(flatten)]
    pub details: T,
}

impl<T> Entity<T> {
    /// Record that was never saved, the repository will assign its id
    pub fn new(details: T) -> Self {
        Self {
            id: None,
            version: 0,
            details,
        }
    }

    /// Record replacing the stored one with the given id, `version` must be the one last read
    pub fn with_identity(id: EntityId, version: Version, details: T) -> Self {
        Self {
            id: Some(id),
            version,
            details,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// True when both values describe the same revision of the same record
    pub fn is_same_revision<U>(&self, other: &Entity<U>) -> bool {
        self.id.is_some() && self.id == other.id && self.version == other.version
    }
}

pub type Author = Entity<AuthorDetails>;
pub type Book = Entity<BookDetails>;
pub type Buy = Entity<BuyDetails>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    pub name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl EntityDetails for AuthorDetails {
    const KIND: &'static str = "Author";
    const TABLE: &'static str = "authors";
    const REFERRERS: &'static [Referrer] = &[Referrer {
        kind: BookDetails::KIND,
        table: BookDetails::TABLE,
        field: "authorId",
    }];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub title: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub price: Option<f64>,
    pub author_id: EntityId,
}

impl EntityDetails for BookDetails {
    const KIND: &'static str = "Book";
    const TABLE: &'static str = "books";
    const REFERRERS: &'static [Referrer] = &[Referrer {
        kind: BuyDetails::KIND,
        table: BuyDetails::TABLE,
        field: "bookId",
    }];

    fn reference(&self) -> Option<Reference> {
        Some(Reference {
            kind: AuthorDetails::KIND,
            table: AuthorDetails::TABLE,
            id: self.author_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyDetails {
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub book_id: Option<EntityId>,
}

impl EntityDetails for BuyDetails {
    const KIND: &'static str = "Buy";
    const TABLE: &'static str = "buys";

    fn reference(&self) -> Option<Reference> {
        self.book_id.map(|id| Reference {
            kind: BookDetails::KIND,
            table: BookDetails::TABLE,
            id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
/// Query of the find/id and delete routes
pub struct IdQuery {
    pub id: EntityId,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Payload of POST /author/save
/// Without `id` a new author is created, with `id` and `version` the stored author is replaced
pub struct SaveAuthorRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Payload of POST /book/save, `idAuthor` must point to an existing author
pub struct SaveBookRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
    pub id_author: Option<EntityId>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Payload of POST /buy/save, `idBook` is optional but must point to an existing book when given
pub struct SaveBuyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub id_book: Option<EntityId>,
}
