//! End-to-end tests driving a running bookstore_service through its client.
//! Point them at the service with `BOOKSTORE_URL` (defaults to http://127.0.0.1:8080).


#[cfg(all(test, feature = "load_tests"))]
mod load_test;

#[cfg(all(test, any(feature = "system_tests", feature = "load_tests")))]
pub(crate) fn bookstore_url() -> String {
    std::env::var("BOOKSTORE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}
