use rand::prelude::SliceRandom;
use rand::{thread_rng, Rng};

use bookstore_service::api::{EntityId, SaveAuthorRequest, SaveBookRequest, SaveBuyRequest};
use bookstore_service::client::BookstoreClient;

use crate::bookstore_url;

#[tokio::test]
async fn generate_lots_of_authors_books_and_buys() {
    const NO_OF_AUTHORS_TO_GENERATE: usize = 20;
    const NO_OF_BOOKS_TO_GENERATE: usize = 100;
    const NO_OF_BUYS_TO_GENERATE: usize = 500;

    let mut rng = thread_rng();
    let client = BookstoreClient::new(&bookstore_url()).expect("Failed to create client");

    let mut author_ids = vec![];
    for author in generate_authors(&mut rng, NO_OF_AUTHORS_TO_GENERATE) {
        let author = client.save_author(&author).await.expect("Failed to save author");
        println!("Added author {:?}", author.id);
        author_ids.extend(author.id);
    }

    let mut book_ids = vec![];
    for book in generate_books(&mut rng, NO_OF_BOOKS_TO_GENERATE, &author_ids) {
        let book = client.save_book(&book).await.expect("Failed to save book");
        println!("Added book {:?}", book.id);
        book_ids.extend(book.id);
    }

    for _ in 0..NO_OF_BUYS_TO_GENERATE {
        let amount = rng.gen_range(1..5) as f64;
        let buy = client
            .save_buy(&SaveBuyRequest {
                amount: Some(amount),
                price: Some(amount * rng.gen_range(5.0..50.0)),
                description: None,
                // some buys are not linked to any book
                id_book: book_ids.choose(&mut rng).copied().filter(|_| rng.gen_bool(0.9)),
                ..SaveBuyRequest::default()
            })
            .await
            .expect("Failed to save buy");
        println!("Added buy {:?} of book {:?}", buy.id, buy.details.book_id);
    }

    let buys = client.list_buys().await.expect("Failed to list buys");
    assert!(buys.len() >= NO_OF_BUYS_TO_GENERATE);
}

fn generate_authors(rng: &mut impl Rng, no_of_authors: usize) -> Vec<SaveAuthorRequest> {
    (0..no_of_authors)
        .map(|no| {
            let name = FIRST_NAMES.choose(rng).unwrap().to_string();
            let last_name = LAST_NAMES.choose(rng).unwrap().to_string();
            SaveAuthorRequest {
                email: Some(format!("{}.{}{}@example.com", name, last_name, no).to_lowercase()),
                phone: None,
                name: Some(name),
                last_name: Some(last_name),
                ..SaveAuthorRequest::default()
            }
        })
        .collect()
}

fn generate_books(
    rng: &mut impl Rng,
    no_of_books_to_generate: usize,
    author_ids: &[EntityId],
) -> Vec<SaveBookRequest> {
    (0..no_of_books_to_generate)
        .map(|no| SaveBookRequest {
            title: Some(format!("A tale of number {} and {}", no, rng.gen_range(0..1000))),
            publisher: Some(format!("Publisher {}", no % 20)),
            year: Some(rng.gen_range(1900..2025)),
            price: Some(rng.gen_range(5.0..50.0)),
            id_author: author_ids.choose(rng).copied(),
            ..SaveBookRequest::default()
        })
        .collect()
}

const FIRST_NAMES: [&str; 24] = [
    "Ada", "Boris", "Clara", "Dmitri", "Elena", "Felix", "Greta", "Hugo", "Ines", "Jonas", "Karin",
    "Luis", "Marta", "Nils", "Olga", "Pablo", "Quinn", "Rosa", "Stefan", "Tereza", "Ugo", "Vera",
    "Walter", "Zofia",
];

const LAST_NAMES: [&str; 20] = [
    "Novak", "Horvat", "Kowalski", "Fischer", "Rossi", "Dubois", "Jansen", "Silva", "Nagy",
    "Popescu", "Lindqvist", "Moreau", "Costa", "Weber", "Kral", "Bauer", "Petrov", "Larsen",
    "Santos", "Varga",
];
