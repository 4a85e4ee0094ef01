use crate::error::{required_email, LibraryError};
use crate::item::{BookRepository, Wishlist, WishlistRepository};
use crate::lending::book_not_found;
use crate::Clock;
use std::sync::Arc;
use tracing::info;

/// 위시리스트 관리
///
/// 대여 가능한 도서는 위시리스트에 추가 할 수 없다. 추가된 도서가 이후 대여 가능 상태가 되더라도
/// 위시리스트에서 자동으로 제거 되지는 않는다.
pub struct WishlistRegistry<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> WishlistRegistry<S>
where
    S: BookRepository + WishlistRepository,
{
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn add(&self, email: Option<&str>, name: Option<&str>, book_id: Option<u64>) -> Result<Wishlist, LibraryError> {
        let email = required_email(email)?;
        let book_id = required_book_id(book_id)?;
        let name = name.map(str::trim).unwrap_or_default();

        let book = self.store.find_by_id(book_id)?
            .ok_or_else(|| book_not_found(book_id))?;
        if book.is_available() {
            return Err(LibraryError::Conflict("Book is available, cannot add to wishlist".to_owned()));
        }

        let wishlist = self.store.add_book(email, name, book_id, self.clock.now())?;
        info!(book_id, wishlist_id = wishlist.id(), "위시리스트에 도서가 추가 되었습니다. ({})", email);
        Ok(wishlist)
    }

    /// 이메일로 위시리스트를 찾아 도서를 제거한다. 추가 할 때 사용한 이름은 확인 하지 않는다.
    pub fn remove(&self, email: Option<&str>, book_id: Option<u64>) -> Result<Wishlist, LibraryError> {
        let email = required_email(email)?;
        let book_id = required_book_id(book_id)?;

        let wishlist = self.store.find_by_email(email)?
            .ok_or_else(|| LibraryError::NotFound(format!("Wishlist for {} not found", email)))?;
        if !wishlist.contains(book_id) {
            return Err(LibraryError::NotFound(format!("Book {} is not in the wishlist", book_id)));
        }

        let wishlist = self.store.remove_book(wishlist.id(), book_id, self.clock.now())?;
        info!(book_id, wishlist_id = wishlist.id(), "위시리스트에서 도서가 제거 되었습니다. ({})", email);
        Ok(wishlist)
    }
}

fn required_book_id(book_id: Option<u64>) -> Result<u64, LibraryError> {
    book_id.ok_or_else(|| LibraryError::InvalidRequest("book_id is required".to_owned()))
}
