use crate::item::repo::Store;
use crate::web::view::WishlistView;
use crate::web::{blocking, parse_body, ApiError, AppState};
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct WishlistBody {
    email: Option<String>,
    name: Option<String>,
    book_id: Option<u64>,
}

pub async fn add<S: Store>(State(state): State<Arc<AppState<S>>>, body: Bytes) -> Result<Json<WishlistView>, ApiError> {
    let body: WishlistBody = parse_body(&body)?;

    let wishlist = blocking(&state, move |state| {
        state.wishlists.add(body.email.as_deref(), body.name.as_deref(), body.book_id)
    }).await?;
    Ok(Json(WishlistView::from(&wishlist)))
}

/// 이메일로 찾은 위시리스트에서 도서를 제거한다. 본문의 `name`은 사용 하지 않는다.
pub async fn remove<S: Store>(State(state): State<Arc<AppState<S>>>, body: Bytes) -> Result<Json<WishlistView>, ApiError> {
    let body: WishlistBody = parse_body(&body)?;

    let wishlist = blocking(&state, move |state| state.wishlists.remove(body.email.as_deref(), body.book_id)).await?;
    Ok(Json(WishlistView::from(&wishlist)))
}
