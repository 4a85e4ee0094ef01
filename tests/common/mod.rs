#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use library_catalog::item::repo::MemoryRepository;
use library_catalog::item::{Author, Book, BookRepository, Language};
use library_catalog::web::{self, AppState};
use library_catalog::Clock;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn at(s: &str) -> Self {
        let now = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap();
        Self { now: Mutex::new(now) }
    }

    pub fn advance_days(&self, days: i64) {
        *self.now.lock() += chrono::Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: MemoryRepository,
    pub clock: Arc<FixedClock>,
}

const ISBNS: [&str; 3] = ["9780306406157", "9781861972712", "9780140449136"];

pub fn book(id: u64, title: &str, author: &str, available: bool) -> Book {
    Book::builder()
        .id(id)
        .isbn(ISBNS[(id as usize - 1) % ISBNS.len()].to_owned())
        .title(title.to_owned())
        .publication_year(2025)
        .language(Language::new(0, "eng".to_owned()))
        .add_author(Author::new(0, author.to_owned()))
        .is_available(available)
        .build()
        .unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        let repository = MemoryRepository::new();
        let clock = Arc::new(FixedClock::at("2025-03-10T10:00:00"));
        let router = web::router(AppState::new(repository.clone(), clock.clone()));
        Self { router, repository, clock }
    }

    pub fn with_books(books: &[Book]) -> Self {
        let app = Self::new();
        for book in books {
            app.repository.save_book(book).unwrap();
        }
        app
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router.clone(), method, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }
}

pub async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}
