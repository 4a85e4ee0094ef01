use crate::catalog::AmazonIdUpdateResult;
use crate::item::{Book, BookRental, Wishlist};
use crate::page::Page;
use crate::rental::RentalStatistics;
use chrono::NaiveDateTime;
use serde::Serialize;

/// 도서 응답. 생성/수정 시각은 노출 하지 않는다.
#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    pub id: u64,
    pub isbn: String,
    pub title: String,
    pub publication_year: i32,
    pub is_available: bool,
    pub amazon_id: Option<String>,
    pub authors: Vec<String>,
    pub language: Option<String>,
}

impl From<&Book> for BookView {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id(),
            isbn: book.isbn().to_owned(),
            title: book.title().to_owned(),
            publication_year: book.publication_year(),
            is_available: book.is_available(),
            amazon_id: book.amazon_id().map(str::to_owned),
            authors: book.authors().iter().map(|a| a.name().to_owned()).collect(),
            language: book.language().map(|l| l.name().to_owned()),
        }
    }
}

/// 대여 기록 응답. 반납 되지 않은 기록의 `duration_days`는 `now` 기준 추정치 이다.
#[derive(Debug, Clone, Serialize)]
pub struct RentalView {
    pub id: u64,
    pub book_id: u64,
    pub book_title: String,
    pub borrower_email: String,
    pub borrowed_at: NaiveDateTime,
    pub returned_at: Option<NaiveDateTime>,
    pub duration_days: i64,
}

impl RentalView {
    pub fn new(rental: &BookRental, book_title: &str, now: NaiveDateTime) -> Self {
        Self {
            id: rental.id(),
            book_id: rental.book_id(),
            book_title: book_title.to_owned(),
            borrower_email: rental.borrower_email().to_owned(),
            borrowed_at: rental.borrowed_at(),
            returned_at: rental.returned_at(),
            duration_days: rental.duration_days(now),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsView {
    pub total_rentals: u64,
    pub currently_rented: u64,
    pub rentals_this_year: u64,
    pub rentals_this_month: u64,
    pub rentals_this_week: u64,
    pub average_rental_days: i64,
}

impl From<&RentalStatistics> for StatisticsView {
    fn from(s: &RentalStatistics) -> Self {
        Self {
            total_rentals: s.total_rentals,
            currently_rented: s.currently_rented,
            rentals_this_year: s.rentals_this_year,
            rentals_this_month: s.rentals_this_month,
            rentals_this_week: s.rentals_this_week,
            average_rental_days: s.average_rental_days,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub statistics: StatisticsView,
    pub rental_history: Vec<RentalView>,
}

/// 페이지 응답. `next`, `previous`는 페이지 번호 이다.
#[derive(Debug, Clone, Serialize)]
pub struct PageView<T> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: T,
}

impl<T> PageView<T> {
    pub fn of<U>(page: &Page<U>, results: T) -> Self {
        Self {
            count: page.count(),
            next: page.next(),
            previous: page.previous(),
            results,
        }
    }
}

/// 대여/반납 응답
#[derive(Debug, Clone, Serialize)]
pub struct LendingView {
    pub message: &'static str,
    pub book: BookView,
    pub rental: RentalView,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub books: Vec<BookView>,
}

impl From<&Wishlist> for WishlistView {
    fn from(wishlist: &Wishlist) -> Self {
        Self {
            id: wishlist.id(),
            email: wishlist.email().to_owned(),
            name: wishlist.name().to_owned(),
            books: wishlist.books().iter().map(BookView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AmazonIdView {
    pub book_id: u64,
    pub amazon_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmazonIdErrorView {
    pub book_id: u64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmazonIdsView {
    pub updated: Vec<AmazonIdView>,
    pub errors: Vec<AmazonIdErrorView>,
}

impl From<AmazonIdUpdateResult> for AmazonIdsView {
    fn from(result: AmazonIdUpdateResult) -> Self {
        Self {
            updated: result.updated.into_iter()
                .map(|u| AmazonIdView { book_id: u.book_id, amazon_id: u.amazon_id })
                .collect(),
            errors: result.errors.into_iter()
                .map(|f| AmazonIdErrorView { book_id: f.book_id, error: f.error })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Author, Language};
    use crate::page::PageRequest;
    use serde_json::json;

    #[test]
    fn book_view_uses_names_and_hides_timestamps() {
        let book = Book::builder()
            .id(3)
            .isbn("0-306-40615-2".to_owned())
            .title("Dune".to_owned())
            .publication_year(1965)
            .language(Language::new(1, "eng".to_owned()))
            .add_author(Author::new(1, "Frank Herbert".to_owned()))
            .build()
            .unwrap();

        let value = serde_json::to_value(BookView::from(&book)).unwrap();
        assert_eq!(value, json!({
            "id": 3,
            "isbn": "0306406152",
            "title": "Dune",
            "publication_year": 1965,
            "is_available": true,
            "amazon_id": null,
            "authors": ["Frank Herbert"],
            "language": "eng",
        }));
    }

    #[test]
    fn page_view_links_are_page_numbers() {
        let page = Page::slice((1..=25).collect::<Vec<u32>>(), PageRequest::new(2, 10));
        let value = serde_json::to_value(PageView::of(&page, page.results().len())).unwrap();

        assert_eq!(value, json!({ "count": 25, "next": 3, "previous": 1, "results": 10 }));
    }
}
