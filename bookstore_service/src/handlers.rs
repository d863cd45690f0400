use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};
use serde::Serialize;

use crate::api::{Entity, IdQuery, SaveAuthorRequest, SaveBookRequest, SaveBuyRequest};
use crate::bookstore::{Bookstore, BookstoreError};

fn error_response(operation: &str, err: BookstoreError) -> HttpResponse {
    match err {
        BookstoreError::Validation(_) => HttpResponse::BadRequest().json(err.to_string()),
        BookstoreError::ReferenceNotFound { .. } => {
            HttpResponse::UnprocessableEntity().json(err.to_string())
        }
        BookstoreError::NotFound { .. } => HttpResponse::NotFound().json(err.to_string()),
        BookstoreError::ConcurrencyConflict { .. } | BookstoreError::StillReferenced { .. } => {
            HttpResponse::Conflict().json(err.to_string())
        }
        BookstoreError::Repository(_) => {
            tracing::error!("{} failed {}", operation, err);
            HttpResponse::InternalServerError().json(err.to_string())
        }
    }
}

fn found<T: Serialize>(operation: &str, result: Result<T, BookstoreError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(err) => error_response(operation, err),
    }
}

/// Saved record is returned in the body, its location in the header
fn saved<T: Serialize>(
    operation: &str,
    resource: &str,
    result: Result<Entity<T>, BookstoreError>,
) -> HttpResponse {
    match result {
        Ok(entity) => {
            let mut response = HttpResponse::Ok();
            if let Some(id) = entity.id {
                response.append_header((LOCATION, format!("/{}/find/id?id={}", resource, id)));
            }
            response.json(entity)
        }
        Err(err) => error_response(operation, err),
    }
}

fn deleted(operation: &str, result: Result<(), BookstoreError>) -> HttpResponse {
    match result {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => error_response(operation, err),
    }
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn find_author(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(found("Find author", bookstore.find_author(query.id).await))
}

#[api_v2_operation]
pub async fn list_authors(bookstore: Data<Bookstore>) -> Result<HttpResponse, Error> {
    Ok(found("List authors", bookstore.list_authors().await))
}

#[api_v2_operation]
pub async fn save_author(
    bookstore: Data<Bookstore>,
    request: web::Json<SaveAuthorRequest>,
) -> Result<HttpResponse, Error> {
    Ok(saved(
        "Save author",
        "author",
        bookstore.save_author(request.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn delete_author(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(deleted("Delete author", bookstore.delete_author(query.id).await))
}

#[api_v2_operation]
pub async fn find_book(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(found("Find book", bookstore.find_book(query.id).await))
}

#[api_v2_operation]
pub async fn list_books(bookstore: Data<Bookstore>) -> Result<HttpResponse, Error> {
    Ok(found("List books", bookstore.list_books().await))
}

#[api_v2_operation]
pub async fn save_book(
    bookstore: Data<Bookstore>,
    request: web::Json<SaveBookRequest>,
) -> Result<HttpResponse, Error> {
    Ok(saved(
        "Save book",
        "book",
        bookstore.save_book(request.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn delete_book(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(deleted("Delete book", bookstore.delete_book(query.id).await))
}

#[api_v2_operation]
pub async fn find_buy(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(found("Find buy", bookstore.find_buy(query.id).await))
}

#[api_v2_operation]
pub async fn list_buys(bookstore: Data<Bookstore>) -> Result<HttpResponse, Error> {
    Ok(found("List buys", bookstore.list_buys().await))
}

#[api_v2_operation]
pub async fn save_buy(
    bookstore: Data<Bookstore>,
    request: web::Json<SaveBuyRequest>,
) -> Result<HttpResponse, Error> {
    Ok(saved(
        "Save buy",
        "buy",
        bookstore.save_buy(request.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn delete_buy(
    bookstore: Data<Bookstore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, Error> {
    Ok(deleted("Delete buy", bookstore.delete_buy(query.id).await))
}
