use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{
    Author, Book, Buy, EntityId, SaveAuthorRequest, SaveBookRequest, SaveBuyRequest,
};

const MAX_RETRIES: u32 = 3;

pub struct BookstoreClient {
    url: String,
    /// Saves are not idempotent, a retried save could create a duplicate
    client: ClientWithMiddleware,
    /// Reads and deletes are safe to repeat
    retrying_client: ClientWithMiddleware,
}

impl BookstoreClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client.clone())
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .build();
        let retrying_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES),
            ))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
            retrying_client,
        })
    }

    /// Calls GET /author/find/id endpoint
    /// Returns None if there is no author with given id
    pub async fn find_author(&self, id: EntityId) -> anyhow::Result<Option<Author>> {
        self.find("author", id).await
    }

    /// Calls GET /author/find/all endpoint
    pub async fn list_authors(&self) -> anyhow::Result<Vec<Author>> {
        self.list("author").await
    }

    /// Calls POST /author/save endpoint
    /// Returns the saved author with its assigned id and current version
    pub async fn save_author(&self, request: &SaveAuthorRequest) -> anyhow::Result<Author> {
        self.save("author", request).await
    }

    /// Calls DELETE /author/delete endpoint
    pub async fn delete_author(&self, id: EntityId) -> anyhow::Result<()> {
        self.delete("author", id).await
    }

    /// Calls GET /book/find/id endpoint
    pub async fn find_book(&self, id: EntityId) -> anyhow::Result<Option<Book>> {
        self.find("book", id).await
    }

    /// Calls GET /book/find/all endpoint
    pub async fn list_books(&self) -> anyhow::Result<Vec<Book>> {
        self.list("book").await
    }

    /// Calls POST /book/save endpoint, fails if the author does not exist
    pub async fn save_book(&self, request: &SaveBookRequest) -> anyhow::Result<Book> {
        self.save("book", request).await
    }

    /// Calls DELETE /book/delete endpoint
    pub async fn delete_book(&self, id: EntityId) -> anyhow::Result<()> {
        self.delete("book", id).await
    }

    /// Calls GET /buy/find/id endpoint
    pub async fn find_buy(&self, id: EntityId) -> anyhow::Result<Option<Buy>> {
        self.find("buy", id).await
    }

    /// Calls GET /buy/find/all endpoint
    pub async fn list_buys(&self) -> anyhow::Result<Vec<Buy>> {
        self.list("buy").await
    }

    /// Calls POST /buy/save endpoint, fails if the book is given and does not exist
    pub async fn save_buy(&self, request: &SaveBuyRequest) -> anyhow::Result<Buy> {
        self.save("buy", request).await
    }

    /// Calls DELETE /buy/delete endpoint
    pub async fn delete_buy(&self, id: EntityId) -> anyhow::Result<()> {
        self.delete("buy", id).await
    }

    async fn find<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: EntityId,
    ) -> anyhow::Result<Option<T>> {
        let response = self
            .retrying_client
            .get(format!("{}/{}/find/id", self.url, resource))
            .query(&[("id", id)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to find {} {}: {}", resource, id, error)
        }
    }

    async fn list<T: DeserializeOwned>(&self, resource: &str) -> anyhow::Result<Vec<T>> {
        let response = self
            .retrying_client
            .get(format!("{}/{}/find/all", self.url, resource))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list {}s {}", resource, error)
        }
    }

    async fn save<R: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        request: &R,
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .post(format!("{}/{}/save", self.url, resource))
            .json(request)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to save {} ({}): {}", resource, status, error)
        }
    }

    async fn delete(&self, resource: &str, id: EntityId) -> anyhow::Result<()> {
        let response = self
            .retrying_client
            .delete(format!("{}/{}/delete", self.url, resource))
            .query(&[("id", id)])
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to delete {} {}: {}", resource, id, error)
        }
    }
}
