use crate::error::{required_email, LibraryError};
use crate::item::{Book, BookRental, BookRepository, NewRental, RepositoryError};
use crate::Clock;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

/// 대여/반납 처리 중 하나의 트랜잭션 안에서 사용할 저장소 연산
pub trait LedgerSession {

    /// 도서를 찾고 트랜잭션이 끝날 때 까지 다른 대여/반납 요청이 해당 도서를 변경 하지 못하도록 잠근다.
    fn lock_book(&mut self, book_id: u64) -> Result<Option<Book>, RepositoryError>;

    /// 도서와 이메일이 모두 일치 하는 대여중인 기록을 찾는다.
    fn find_open_rental(&mut self, book_id: u64, email: &str) -> Result<Option<BookRental>, RepositoryError>;

    fn save_availability(&mut self, book_id: u64, is_available: bool, at: NaiveDateTime) -> Result<(), RepositoryError>;

    fn append_rental(&mut self, rental: &NewRental) -> Result<BookRental, RepositoryError>;

    fn close_rental(&mut self, rental_id: u64, returned_at: NaiveDateTime) -> Result<BookRental, RepositoryError>;
}

/// 대여 기록과 대여 가능 여부를 하나의 단위로 변경 할 수 있는 저장소
pub trait LendingStore {

    /// `work`를 하나의 트랜잭션으로 실행한다. `work`가 에러를 반환하면 모든 변경 사항은 롤백 된다.
    fn atomically<T, F>(&self, work: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut dyn LedgerSession) -> Result<T, LibraryError>;
}

/// 도서 대여 상태 관리
///
/// 도서의 대여 가능 여부는 이 타입을 통해서만 변경 된다.
pub struct Lending<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> Lending<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S: LendingStore> Lending<S> {

    /// 대여 가능한 도서를 대여한다.
    pub fn borrow(&self, book_id: u64, borrower_email: Option<&str>) -> Result<BookRental, LibraryError> {
        let email = required_email(borrower_email)?;
        let now = self.clock.now();

        let rental = self.store.atomically(|session| {
            let book = session.lock_book(book_id)?
                .ok_or_else(|| book_not_found(book_id))?;
            if !book.is_available() {
                return Err(LibraryError::Conflict("Book is not available".to_owned()));
            }

            let rental = session.append_rental(&NewRental {
                book_id,
                borrower_email: email,
                borrowed_at: now,
            })?;
            session.save_availability(book_id, false, now)?;
            Ok(rental)
        })?;

        info!(book_id, rental_id = rental.id(), "도서가 대여 되었습니다. ({})", email);
        Ok(rental)
    }

    /// 대여중인 도서를 반납한다. 대여한 이메일과 반납 요청 이메일이 일치 해야 한다.
    pub fn return_book(&self, book_id: u64, borrower_email: Option<&str>) -> Result<BookRental, LibraryError> {
        let email = required_email(borrower_email)?;
        let now = self.clock.now();

        let rental = self.store.atomically(|session| {
            let book = session.lock_book(book_id)?
                .ok_or_else(|| book_not_found(book_id))?;
            if book.is_available() {
                return Err(LibraryError::Conflict("Book is already available".to_owned()));
            }

            let open = session.find_open_rental(book_id, email)?
                .ok_or_else(|| LibraryError::NoOpenRental { book_id, email: email.to_owned() })?;
            let rental = session.close_rental(open.id(), now)?;
            session.save_availability(book_id, true, now)?;
            Ok(rental)
        })?;

        info!(book_id, rental_id = rental.id(), "도서가 반납 되었습니다. ({})", email);
        Ok(rental)
    }
}

impl<S: BookRepository> Lending<S> {

    /// 관리자용 대여 가능 여부 강제 변경
    ///
    /// 대여 기록은 변경 하지 않으므로 대여 기록과 대여 가능 여부가 달라 질 수 있다.
    pub fn change_availability(&self, book_id: u64, is_available: Option<bool>) -> Result<Book, LibraryError> {
        let is_available = is_available
            .ok_or_else(|| LibraryError::InvalidRequest("is_available field is required".to_owned()))?;

        let book = self.store.update_availability(book_id, is_available, self.clock.now())?
            .ok_or_else(|| book_not_found(book_id))?;

        warn!(book_id, is_available, "도서 대여 가능 여부가 관리자에 의해 변경 되었습니다.");
        Ok(book)
    }
}

pub(crate) fn book_not_found(book_id: u64) -> LibraryError {
    LibraryError::NotFound(format!("Book {} not found", book_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::repo::MemoryRepository;
    use crate::item::{RentalFilter, RentalRepository};
    use crate::tests::{fixture_book, FixedClock};

    fn setup(available: bool) -> (MemoryRepository, Lending<MemoryRepository>, Arc<FixedClock>) {
        let repository = MemoryRepository::new();
        repository.save_book(&fixture_book(1, available)).unwrap();
        let clock = Arc::new(FixedClock::at("2025-03-01T10:00:00"));
        let lending = Lending::new(repository.clone(), clock.clone());
        (repository, lending, clock)
    }

    fn open_rentals(repository: &MemoryRepository) -> usize {
        repository.find_rentals(&RentalFilter::default()).unwrap()
            .iter()
            .filter(|r| r.rental().is_open())
            .count()
    }

    #[test]
    fn borrow_then_conflict_then_return() {
        let (repository, lending, clock) = setup(true);

        let rental = lending.borrow(1, Some("a@x.com")).unwrap();
        assert!(rental.is_open());
        assert!(!repository.find_by_id(1).unwrap().unwrap().is_available());
        assert_eq!(open_rentals(&repository), 1);

        let second = lending.borrow(1, Some("b@x.com"));
        assert!(matches!(second, Err(LibraryError::Conflict(_))));
        assert_eq!(repository.find_rentals(&RentalFilter::default()).unwrap().len(), 1);

        clock.advance_days(3);
        let returned = lending.return_book(1, Some("a@x.com")).unwrap();
        assert_eq!(returned.id(), rental.id());
        assert_eq!(returned.duration_days(clock.now()), 3);
        assert!(repository.find_by_id(1).unwrap().unwrap().is_available());
        assert_eq!(open_rentals(&repository), 0);
    }

    #[test]
    fn missing_email_is_invalid_request() {
        let (repository, lending, _) = setup(true);

        assert!(matches!(lending.borrow(1, None), Err(LibraryError::InvalidRequest(_))));
        assert!(matches!(lending.borrow(1, Some("  ")), Err(LibraryError::InvalidRequest(_))));
        assert!(matches!(lending.return_book(1, None), Err(LibraryError::InvalidRequest(_))));
        assert!(repository.find_by_id(1).unwrap().unwrap().is_available());
    }

    #[test]
    fn unknown_book_is_not_found() {
        let (_, lending, _) = setup(true);

        assert!(matches!(lending.borrow(99, Some("a@x.com")), Err(LibraryError::NotFound(_))));
        assert!(matches!(lending.return_book(99, Some("a@x.com")), Err(LibraryError::NotFound(_))));
    }

    #[test]
    fn returning_an_available_book_is_conflict() {
        let (_, lending, _) = setup(true);

        assert!(matches!(lending.return_book(1, Some("a@x.com")), Err(LibraryError::Conflict(_))));
    }

    #[test]
    fn return_requires_the_borrower_email() {
        let (repository, lending, _) = setup(true);
        lending.borrow(1, Some("a@x.com")).unwrap();

        let result = lending.return_book(1, Some("b@x.com"));
        assert!(matches!(result, Err(LibraryError::NoOpenRental { book_id: 1, .. })));
        assert!(!repository.find_by_id(1).unwrap().unwrap().is_available());
        assert_eq!(open_rentals(&repository), 1);
    }

    #[test]
    fn book_can_be_borrowed_again_after_return() {
        let (repository, lending, _) = setup(true);

        lending.borrow(1, Some("a@x.com")).unwrap();
        lending.return_book(1, Some("a@x.com")).unwrap();
        lending.borrow(1, Some("b@x.com")).unwrap();

        let rentals = repository.find_rentals(&RentalFilter::default()).unwrap();
        assert_eq!(rentals.len(), 2);
        assert_eq!(open_rentals(&repository), 1);
    }

    #[test]
    fn admin_override_does_not_touch_the_ledger() {
        let (repository, lending, _) = setup(true);

        let book = lending.change_availability(1, Some(false)).unwrap();
        assert!(!book.is_available());
        assert_eq!(repository.find_rentals(&RentalFilter::default()).unwrap().len(), 0);

        assert!(matches!(lending.change_availability(1, None), Err(LibraryError::InvalidRequest(_))));
        assert!(matches!(lending.change_availability(42, Some(true)), Err(LibraryError::NotFound(_))));
    }
}
