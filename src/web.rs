mod books;
mod view;
mod wishlist;

use crate::catalog::Catalog;
use crate::error::{ErrorKind, LibraryError};
use crate::item::repo::Store;
use crate::lending::Lending;
use crate::rental::RentalLedger;
use crate::wishlist::WishlistRegistry;
use crate::Clock;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// HTTP 핸들러가 공유하는 서비스 묶음
pub struct AppState<S> {
    catalog: Catalog<S>,
    lending: Lending<S>,
    ledger: RentalLedger<S>,
    wishlists: WishlistRegistry<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: Catalog::new(store.clone(), clock.clone()),
            lending: Lending::new(store.clone(), clock.clone()),
            ledger: RentalLedger::new(store.clone(), clock.clone()),
            wishlists: WishlistRegistry::new(store, clock.clone()),
            clock,
        }
    }
}

pub fn router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/books/", get(books::list::<S>))
        .route("/books/rental-report/", get(books::rental_report::<S>))
        .route("/books/update-amazon-ids/", post(books::update_amazon_ids::<S>))
        .route("/books/{id}/", get(books::retrieve::<S>).put(books::change_availability::<S>))
        .route("/books/{id}/borrow/", post(books::borrow::<S>))
        .route("/books/{id}/return/", post(books::return_book::<S>))
        .route("/wishlist/", post(wishlist::add::<S>).delete(wishlist::remove::<S>))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn not_found() -> ApiError {
    ApiError::Library(LibraryError::NotFound("Not found.".to_owned()))
}

/// 핸들러 에러. 모든 비즈니스 에러는 JSON 응답으로 변환 된다.
#[derive(Debug)]
pub enum ApiError {
    Library(LibraryError),

    /// 블로킹 작업이 완료 되지 못함 (panic, 취소)
    Internal(String),
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        ApiError::Library(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            ApiError::Library(e) => e,
            ApiError::Internal(message) => {
                error!("요청을 처리 할 수 없습니다. {}", message);
                return internal_error();
            }
        };

        let status = match &e {
            LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
            LibraryError::InvalidRequest(_)
            | LibraryError::Conflict(_)
            | LibraryError::NoOpenRental { .. }
            | LibraryError::Validation(_) => StatusCode::BAD_REQUEST,
            LibraryError::Repository(repository_error) => {
                error!("저장소 에러가 발생 했습니다. {}", repository_error);
                return internal_error();
            }
        };

        let body = match e {
            LibraryError::Validation(errors) => json!({ "errors": errors, "kind": ErrorKind::Validation.code() }),
            e => json!({ "error": e.to_string(), "kind": e.kind().code() }),
        };
        (status, Json(body)).into_response()
    }
}

fn internal_error() -> Response {
    let body = json!({ "error": "Internal server error", "kind": ErrorKind::Internal.code() });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// 동기 저장소 호출을 블로킹 스레드 풀에서 실행한다.
async fn blocking<S, T, F>(state: &Arc<AppState<S>>, work: F) -> Result<T, ApiError>
where
    S: Store,
    T: Send + 'static,
    F: FnOnce(&AppState<S>) -> Result<T, LibraryError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// 요청 본문을 JSON으로 해석한다. 본문이 비어 있으면 기본값(모든 필드 누락)을 사용한다.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, LibraryError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| LibraryError::InvalidRequest(format!("Malformed JSON body: {}", e)))
}

/// 경로의 도서 아이디를 해석한다. 정수가 아닌 아이디는 존재 하지 않는 경로로 처리한다.
fn parse_book_id(raw: &str) -> Result<u64, LibraryError> {
    raw.parse::<u64>().map_err(|_| LibraryError::NotFound("Not found.".to_owned()))
}
