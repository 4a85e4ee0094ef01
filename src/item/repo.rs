use crate::item::{BookRepository, RentalRepository, WishlistRepository};
use crate::lending::LendingStore;

mod diesel;
mod memory;

pub use self::diesel::{DbPool, DieselRepository};
pub use self::memory::MemoryRepository;

/// 웹 계층에서 사용할 저장소 묶음
pub trait Store:
    BookRepository + RentalRepository + WishlistRepository + LendingStore + Clone + Send + Sync + 'static
{
}

impl<T> Store for T
where
    T: BookRepository + RentalRepository + WishlistRepository + LendingStore + Clone + Send + Sync + 'static
{
}
