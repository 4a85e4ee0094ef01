use crate::error::LibraryError;
use crate::item::{
    Author, Book, BookQuery, BookRental, BookRepository, Language, NewRental, RentalFilter, RentalRecord,
    RentalRepository, RepositoryError, Wishlist, WishlistRepository,
};
use crate::lending::{LedgerSession, LendingStore};
use crate::page::{Page, PageRequest};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct WishlistRow {
    id: u64,
    email: String,
    name: String,
    book_ids: BTreeSet<u64>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// 등록 순서
    books: Vec<Book>,
    authors: Vec<Author>,
    languages: Vec<Language>,
    rentals: Vec<BookRental>,
    wishlists: Vec<WishlistRow>,
    sequence: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn book(&self, id: u64) -> Option<&Book> {
        self.books.iter().find(|b| b.id() == id)
    }

    fn book_mut(&mut self, id: u64) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id() == id)
    }

    fn author_or_create(&mut self, name: &str) -> Author {
        if let Some(author) = self.authors.iter().find(|a| a.name() == name) {
            return author.clone();
        }
        let author = Author::new(self.next_id(), name.to_owned());
        self.authors.push(author.clone());
        author
    }

    fn language_or_create(&mut self, name: &str) -> Language {
        if let Some(language) = self.languages.iter().find(|l| l.name() == name) {
            return language.clone();
        }
        let language = Language::new(self.next_id(), name.to_owned());
        self.languages.push(language.clone());
        language
    }

    fn wishlist(&self, row: &WishlistRow) -> Wishlist {
        let books = row.book_ids.iter()
            .filter_map(|id| self.book(*id).cloned())
            .collect();
        Wishlist::new(row.id, row.email.clone(), row.name.clone(), books)
    }
}

impl LedgerSession for MemoryState {
    fn lock_book(&mut self, book_id: u64) -> Result<Option<Book>, RepositoryError> {
        Ok(self.book(book_id).cloned())
    }

    fn find_open_rental(&mut self, book_id: u64, email: &str) -> Result<Option<BookRental>, RepositoryError> {
        Ok(self.rentals.iter()
            .rev()
            .find(|r| r.book_id() == book_id && r.borrower_email() == email && r.is_open())
            .cloned())
    }

    fn save_availability(&mut self, book_id: u64, is_available: bool, at: NaiveDateTime) -> Result<(), RepositoryError> {
        let book = self.book_mut(book_id)
            .ok_or_else(|| RepositoryError::SqlExecuteError(format!("book {} does not exist", book_id)))?;
        book.set_available(is_available, at);
        Ok(())
    }

    fn append_rental(&mut self, rental: &NewRental) -> Result<BookRental, RepositoryError> {
        let rental = BookRental::new(
            self.next_id(),
            rental.book_id,
            rental.borrower_email.to_owned(),
            rental.borrowed_at,
            None,
        );
        self.rentals.push(rental.clone());
        Ok(rental)
    }

    fn close_rental(&mut self, rental_id: u64, returned_at: NaiveDateTime) -> Result<BookRental, RepositoryError> {
        let rental = self.rentals.iter_mut()
            .find(|r| r.id() == rental_id)
            .ok_or_else(|| RepositoryError::SqlExecuteError(format!("rental {} does not exist", rental_id)))?;
        rental.close(returned_at);
        Ok(rental.clone())
    }
}

/// 프로세스 메모리에 데이터를 보관하는 저장소
///
/// 트랜잭션은 전체 상태에 대한 잠금과 복사본 위에서 실행 되며, 성공 했을 때만 반영된다.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookRepository for MemoryRepository {
    fn find_by_id(&self, id: u64) -> Result<Option<Book>, RepositoryError> {
        Ok(self.state.lock().book(id).cloned())
    }

    fn search(&self, query: &BookQuery, page: &PageRequest) -> Result<Page<Book>, RepositoryError> {
        let state = self.state.lock();
        let matched = state.books.iter()
            .rev()
            .filter(|b| query.matches(b))
            .cloned()
            .collect::<Vec<_>>();
        Ok(Page::slice(matched, *page))
    }

    fn save_book(&self, book: &Book) -> Result<Book, RepositoryError> {
        let mut state = self.state.lock();

        if state.books.iter().any(|b| b.isbn() == book.isbn() && b.id() != book.id()) {
            return Err(RepositoryError::UniqueViolation(format!("isbn {} already exists", book.isbn())));
        }

        let authors = book.authors().iter()
            .map(|a| state.author_or_create(a.name()))
            .collect::<Vec<_>>();

        if let Some(exists) = state.book_mut(book.id()) {
            exists.set_authors(authors);
            return Ok(exists.clone());
        }

        let mut builder = book.to_builder();
        if let Some(language) = book.language() {
            builder = builder.language(state.language_or_create(language.name()));
        }
        let mut saved = builder.build()?;
        saved.set_authors(authors);

        state.books.push(saved.clone());
        Ok(saved)
    }

    fn update_availability(&self, id: u64, is_available: bool, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError> {
        let mut state = self.state.lock();
        Ok(state.book_mut(id).map(|book| {
            book.set_available(is_available, at);
            book.clone()
        }))
    }

    fn update_amazon_id(&self, id: u64, amazon_id: &str, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError> {
        let mut state = self.state.lock();
        Ok(state.book_mut(id).map(|book| {
            book.set_amazon_id(amazon_id.to_owned(), at);
            book.clone()
        }))
    }
}

impl RentalRepository for MemoryRepository {
    fn find_rentals(&self, filter: &RentalFilter) -> Result<Vec<RentalRecord>, RepositoryError> {
        let state = self.state.lock();
        let mut rentals = state.rentals.iter()
            .filter(|r| filter.matches(r))
            .map(|r| {
                let title = state.book(r.book_id())
                    .map(|b| b.title().to_owned())
                    .unwrap_or_default();
                RentalRecord::new(r.clone(), title)
            })
            .collect::<Vec<_>>();

        rentals.sort_by(|a, b| {
            b.rental().borrowed_at().cmp(&a.rental().borrowed_at())
                .then(b.rental().id().cmp(&a.rental().id()))
        });
        Ok(rentals)
    }
}

impl WishlistRepository for MemoryRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<Wishlist>, RepositoryError> {
        let state = self.state.lock();
        Ok(state.wishlists.iter()
            .find(|w| w.email == email)
            .map(|w| state.wishlist(w)))
    }

    fn add_book(&self, email: &str, name: &str, book_id: u64, _at: NaiveDateTime) -> Result<Wishlist, RepositoryError> {
        let mut state = self.state.lock();
        if state.book(book_id).is_none() {
            return Err(RepositoryError::SqlExecuteError(format!("book {} does not exist", book_id)));
        }

        let index = match state.wishlists.iter().position(|w| w.email == email && w.name == name) {
            Some(index) => index,
            None => {
                let id = state.next_id();
                state.wishlists.push(WishlistRow {
                    id,
                    email: email.to_owned(),
                    name: name.to_owned(),
                    book_ids: BTreeSet::new(),
                });
                state.wishlists.len() - 1
            }
        };
        state.wishlists[index].book_ids.insert(book_id);

        Ok(state.wishlist(&state.wishlists[index]))
    }

    fn remove_book(&self, wishlist_id: u64, book_id: u64, _at: NaiveDateTime) -> Result<Wishlist, RepositoryError> {
        let mut state = self.state.lock();
        let row = state.wishlists.iter_mut()
            .find(|w| w.id == wishlist_id)
            .ok_or_else(|| RepositoryError::SqlExecuteError(format!("wishlist {} does not exist", wishlist_id)))?;
        row.book_ids.remove(&book_id);
        let row = row.clone();

        Ok(state.wishlist(&row))
    }
}

impl LendingStore for MemoryRepository {
    fn atomically<T, F>(&self, work: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut dyn LedgerSession) -> Result<T, LibraryError>,
    {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        let result = work(&mut draft)?;
        *state = draft;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixture_book;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn failed_transaction_is_rolled_back() {
        let repository = MemoryRepository::new();
        repository.save_book(&fixture_book(1, true)).unwrap();

        let result: Result<(), LibraryError> = repository.atomically(|session| {
            session.append_rental(&NewRental { book_id: 1, borrower_email: "a@x.com", borrowed_at: now() })?;
            session.save_availability(1, false, now())?;
            Err(LibraryError::Conflict("abort".to_owned()))
        });

        assert!(result.is_err());
        assert!(repository.find_by_id(1).unwrap().unwrap().is_available());
        assert!(repository.find_rentals(&RentalFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn save_book_gets_or_creates_authors_and_languages() {
        let repository = MemoryRepository::new();
        let first = repository.save_book(&fixture_book(1, true)).unwrap();
        let second = repository.save_book(&fixture_book(2, true)).unwrap();

        assert_eq!(first.authors()[0].id(), second.authors()[0].id());
        assert_eq!(first.language().map(|l| l.id()), second.language().map(|l| l.id()));
        assert_eq!(second.authors(), &[Author::new(first.authors()[0].id(), "Test Author".to_owned())]);
        assert_eq!(second.language(), Some(&Language::new(first.language().unwrap().id(), "eng".to_owned())));

        let again = repository.save_book(&fixture_book(1, false)).unwrap();
        assert!(again.is_available());
    }

    #[test]
    fn duplicated_isbn_is_rejected() {
        let repository = MemoryRepository::new();
        repository.save_book(&fixture_book(1, true)).unwrap();

        let result = repository.save_book(&fixture_book(6, true));
        assert!(matches!(result, Err(RepositoryError::UniqueViolation(_))));
    }

    #[test]
    fn wishlist_add_is_idempotent() {
        let repository = MemoryRepository::new();
        repository.save_book(&fixture_book(1, false)).unwrap();

        repository.add_book("a@x.com", "A", 1, now()).unwrap();
        let wishlist = repository.add_book("a@x.com", "A", 1, now()).unwrap();
        assert_eq!(wishlist.books().len(), 1);

        let other = repository.add_book("a@x.com", "B", 1, now()).unwrap();
        assert_ne!(other.id(), wishlist.id());
        assert_eq!(repository.find_by_email("a@x.com").unwrap().unwrap().id(), wishlist.id());
    }
}
