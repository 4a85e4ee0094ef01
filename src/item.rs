pub mod repo;
pub mod isbn;

use crate::page::{Page, PageRequest};
use chrono::NaiveDateTime;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Item 모듈에서 사용할 에러 열거
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// 필수 데이터가 입력 되지 않음
    RequireArgumentMissing(String),

    /// ISBN 형식 혹은 체크섬이 올바르지 않음
    InvalidIsbn(String),
}

impl Display for ItemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ItemError::RequireArgumentMissing(name) => write!(f, "required argument missing: {}", name),
            ItemError::InvalidIsbn(isbn) => write!(f, "invalid isbn: {}", isbn),
        }
    }
}

impl std::error::Error for ItemError {}

/// 저장소 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("connect error: {0}")]
    ConnectError(String),

    #[error("sql execute error: {0}")]
    SqlExecuteError(String),

    /// 유니크 제약 조건 위반 (ex. 이미 등록된 ISBN)
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// 저장된 데이터를 도메인으로 변환 할 수 없음
    #[error("convert error: {0}")]
    ConvertError(String),
}

impl From<ItemError> for RepositoryError {
    fn from(e: ItemError) -> Self {
        RepositoryError::ConvertError(e.to_string())
    }
}

/// 저자
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    id: u64,
    name: String,
}

impl Author {
    pub fn new(id: u64, name: String) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 도서 언어
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Language {
    id: u64,
    name: String,
}

impl Language {
    pub fn new(id: u64, name: String) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 도서
///
/// `is_available`은 대여 기록과 항상 일치 해야 한다. 반납 되지 않은 대여 기록이 있다면 `false`,
/// 없다면 `true` 이며, 이 값은 [`crate::lending::Lending`]을 통해서만 변경 된다.
/// (관리자용 강제 변경 제외)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Book {
    id: u64,
    isbn: String,
    title: String,
    publication_year: i32,
    language: Option<Language>,
    authors: Vec<Author>,
    is_available: bool,
    amazon_id: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl Book {
    pub fn builder() -> BookBuilder {
        BookBuilder::new()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn publication_year(&self) -> i32 {
        self.publication_year
    }

    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn amazon_id(&self) -> Option<&str> {
        self.amazon_id.as_deref()
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    pub fn set_available(&mut self, is_available: bool, at: NaiveDateTime) {
        self.is_available = is_available;
        self.updated_at = Some(at);
    }

    pub fn set_amazon_id(&mut self, amazon_id: String, at: NaiveDateTime) {
        self.amazon_id = Some(amazon_id);
        self.updated_at = Some(at);
    }

    pub fn set_authors(&mut self, authors: Vec<Author>) {
        self.authors = authors;
    }

    pub fn to_builder(&self) -> BookBuilder {
        let mut builder = BookBuilder::new()
            .id(self.id)
            .isbn(self.isbn.clone())
            .title(self.title.clone())
            .publication_year(self.publication_year)
            .is_available(self.is_available);

        if let Some(language) = &self.language {
            builder = builder.language(language.clone());
        }

        for author in &self.authors {
            builder = builder.add_author(author.clone());
        }

        if let Some(amazon_id) = &self.amazon_id {
            builder = builder.amazon_id(amazon_id.clone());
        }

        if let Some(created_at) = self.created_at {
            builder = builder.created_at(created_at);
        }

        if let Some(updated_at) = self.updated_at {
            builder = builder.updated_at(updated_at);
        }

        builder
    }
}

/// Book 빌더
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BookBuilder {
    id: Option<u64>,
    isbn: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    language: Option<Language>,
    authors: Vec<Author>,
    is_available: bool,
    amazon_id: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl BookBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            isbn: None,
            title: None,
            publication_year: None,
            language: None,
            authors: Vec::new(),
            is_available: true,
            amazon_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn isbn(mut self, isbn: String) -> Self {
        self.isbn = Some(isbn);
        self
    }

    pub fn title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    pub fn publication_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn add_author(mut self, author: Author) -> Self {
        self.authors.push(author);
        self
    }

    pub fn is_available(mut self, is_available: bool) -> Self {
        self.is_available = is_available;
        self
    }

    pub fn amazon_id(mut self, amazon_id: String) -> Self {
        self.amazon_id = Some(amazon_id);
        self
    }

    pub fn created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: NaiveDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// 도서를 생성한다. ISBN은 하이픈/공백이 제거된 형태로 정규화 되며 체크섬이 맞지 않을 경우 에러를 반환한다.
    pub fn build(self) -> Result<Book, ItemError> {
        let id = self.id.ok_or(ItemError::RequireArgumentMissing("id".to_owned()))?;
        let isbn = self.isbn.ok_or(ItemError::RequireArgumentMissing("isbn".to_owned()))?;
        let title = self.title.ok_or(ItemError::RequireArgumentMissing("title".to_owned()))?;
        let publication_year = self.publication_year
            .ok_or(ItemError::RequireArgumentMissing("publication_year".to_owned()))?;

        Ok(Book {
            id,
            isbn: isbn::normalize(&isbn)?,
            title,
            publication_year,
            language: self.language,
            authors: self.authors,
            is_available: self.is_available,
            amazon_id: self.amazon_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl Default for BookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 도서 대여 기록
///
/// `returned_at`이 `None`인 기록은 아직 반납 되지 않은(대여중인) 기록이다.
/// 반납시 단 한번 `returned_at`이 설정 되며 기록은 삭제 되지 않는다.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BookRental {
    id: u64,
    book_id: u64,
    borrower_email: String,
    borrowed_at: NaiveDateTime,
    returned_at: Option<NaiveDateTime>,
}

impl BookRental {
    pub fn new(
        id: u64,
        book_id: u64,
        borrower_email: String,
        borrowed_at: NaiveDateTime,
        returned_at: Option<NaiveDateTime>,
    ) -> Self {
        Self { id, book_id, borrower_email, borrowed_at, returned_at }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn book_id(&self) -> u64 {
        self.book_id
    }

    pub fn borrower_email(&self) -> &str {
        &self.borrower_email
    }

    pub fn borrowed_at(&self) -> NaiveDateTime {
        self.borrowed_at
    }

    pub fn returned_at(&self) -> Option<NaiveDateTime> {
        self.returned_at
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn close(&mut self, returned_at: NaiveDateTime) {
        self.returned_at = Some(returned_at);
    }

    /// 대여 기간을 일 단위(내림)로 계산한다.
    ///
    /// 반납 되지 않은 기록은 `now`를 기준으로 계산한 추정치 이다.
    pub fn duration_days(&self, now: NaiveDateTime) -> i64 {
        let until = self.returned_at.unwrap_or(now);
        (until - self.borrowed_at).num_seconds().div_euclid(86_400)
    }
}

/// 새로 추가할 대여 기록
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewRental<'a> {
    pub book_id: u64,
    pub borrower_email: &'a str,
    pub borrowed_at: NaiveDateTime,
}

/// 리포트 조회용 대여 기록 (도서 제목 포함)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RentalRecord {
    rental: BookRental,
    book_title: String,
}

impl RentalRecord {
    pub fn new(rental: BookRental, book_title: String) -> Self {
        Self { rental, book_title }
    }

    pub fn rental(&self) -> &BookRental {
        &self.rental
    }

    pub fn book_title(&self) -> &str {
        &self.book_title
    }
}

/// 위시리스트
///
/// (이메일, 이름)으로 구분 되며 첫 도서 추가시 생성된다.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Wishlist {
    id: u64,
    email: String,
    name: String,
    books: Vec<Book>,
}

impl Wishlist {
    pub fn new(id: u64, email: String, name: String, books: Vec<Book>) -> Self {
        Self { id, email, name, books }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn contains(&self, book_id: u64) -> bool {
        self.books.iter().any(|b| b.id() == book_id)
    }
}

/// 도서 검색 조건
///
/// 제목과 저자는 대소문자 구분 없는 부분 일치로 검색하며, 모두 전달 될 경우 AND 조건으로 검색한다.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BookQuery {
    title: Option<String>,
    author: Option<String>,
    is_available: Option<bool>,
}

impl BookQuery {
    pub fn new(title: Option<String>, author: Option<String>, is_available: Option<bool>) -> Self {
        Self {
            title: title.filter(|t| !t.is_empty()),
            author: author.filter(|a| !a.is_empty()),
            is_available,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn is_available(&self) -> Option<bool> {
        self.is_available
    }

    pub fn matches(&self, book: &Book) -> bool {
        let title_matched = self.title()
            .map_or(true, |t| book.title().to_lowercase().contains(&t.to_lowercase()));
        let author_matched = self.author()
            .map_or(true, |a| {
                let a = a.to_lowercase();
                book.authors().iter().any(|author| author.name().to_lowercase().contains(&a))
            });
        let availability_matched = self.is_available
            .map_or(true, |available| book.is_available() == available);

        title_matched && author_matched && availability_matched
    }
}

/// 대여 기록 상태
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RentalStatus {
    /// 대여중
    Active,

    /// 반납 완료
    Returned,
}

impl RentalStatus {
    /// 알 수 없는 값은 `None`으로 처리한다.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "active" => Some(RentalStatus::Active),
            "returned" => Some(RentalStatus::Returned),
            _ => None,
        }
    }
}

/// 대여 기록 조회 조건
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RentalFilter {
    email: Option<String>,
    status: Option<RentalStatus>,
}

impl RentalFilter {
    pub fn new(email: Option<String>, status: Option<RentalStatus>) -> Self {
        Self { email: email.filter(|e| !e.is_empty()), status }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn status(&self) -> Option<RentalStatus> {
        self.status
    }

    pub fn matches(&self, rental: &BookRental) -> bool {
        let email_matched = self.email().map_or(true, |e| rental.borrower_email() == e);
        let status_matched = match self.status {
            Some(RentalStatus::Active) => rental.is_open(),
            Some(RentalStatus::Returned) => !rental.is_open(),
            None => true,
        };
        email_matched && status_matched
    }
}

/// 도서 저장소
pub trait BookRepository {

    /// 아이디로 도서를 찾는다.
    fn find_by_id(&self, id: u64) -> Result<Option<Book>, RepositoryError>;

    /// 검색 조건에 맞는 도서를 최근 등록 순으로 페이지 단위로 검색한다.
    fn search(&self, query: &BookQuery, page: &PageRequest) -> Result<Page<Book>, RepositoryError>;

    /// 도서를 저장한다. 이미 같은 아이디의 도서가 있다면 기존 도서를 유지하고 저자 목록만 교체한다.
    ///
    /// 언어와 저자는 이름으로 찾아 없을 경우 새로 생성한다.
    fn save_book(&self, book: &Book) -> Result<Book, RepositoryError>;

    /// 대여 기록과 무관하게 도서의 대여 가능 여부를 변경한다.
    fn update_availability(&self, id: u64, is_available: bool, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError>;

    /// 도서의 아마존 아이디를 변경한다.
    fn update_amazon_id(&self, id: u64, amazon_id: &str, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError>;
}

/// 대여 기록 저장소 (조회 전용)
pub trait RentalRepository {

    /// 조건에 맞는 대여 기록을 대여일 역순으로 찾는다.
    fn find_rentals(&self, filter: &RentalFilter) -> Result<Vec<RentalRecord>, RepositoryError>;
}

/// 위시리스트 저장소
pub trait WishlistRepository {

    /// 이메일로 위시리스트를 찾는다. 같은 이메일로 여러 위시리스트가 있다면 가장 먼저 생성된 위시리스트를 반환한다.
    fn find_by_email(&self, email: &str) -> Result<Option<Wishlist>, RepositoryError>;

    /// (이메일, 이름)의 위시리스트를 찾아 없으면 생성하고 도서를 추가한다. 이미 추가된 도서는 무시한다.
    fn add_book(&self, email: &str, name: &str, book_id: u64, at: NaiveDateTime) -> Result<Wishlist, RepositoryError>;

    /// 위시리스트에서 도서를 제거한다.
    fn remove_book(&self, wishlist_id: u64, book_id: u64, at: NaiveDateTime) -> Result<Wishlist, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn build_requires_isbn_and_title() {
        let result = Book::builder().id(1).title("Dune".to_owned()).publication_year(1965).build();
        assert_eq!(result, Err(ItemError::RequireArgumentMissing("isbn".to_owned())));

        let result = Book::builder().id(1).isbn("9780306406157".to_owned()).publication_year(1965).build();
        assert_eq!(result, Err(ItemError::RequireArgumentMissing("title".to_owned())));
    }

    #[test]
    fn build_normalizes_isbn_and_defaults_to_available() {
        let book = Book::builder()
            .id(7)
            .isbn("978-0-306-40615-7".to_owned())
            .title("Dune".to_owned())
            .publication_year(1965)
            .build()
            .unwrap();

        assert_eq!(book.isbn(), "9780306406157");
        assert!(book.is_available());
        assert_eq!(book.to_builder().build().unwrap(), book);
    }

    #[test]
    fn duration_is_floored_to_whole_days() {
        let mut rental = BookRental::new(1, 1, "a@x.com".to_owned(), at(1, 10), None);
        assert_eq!(rental.duration_days(at(4, 9)), 2);
        assert_eq!(rental.duration_days(at(4, 10)), 3);

        rental.close(at(2, 11));
        assert_eq!(rental.duration_days(at(30, 0)), 1);
    }

    #[test]
    fn query_matches_title_and_author_case_insensitive() {
        let book = Book::builder()
            .id(1)
            .isbn("9780306406157".to_owned())
            .title("The Left Hand of Darkness".to_owned())
            .publication_year(1969)
            .add_author(Author::new(1, "Ursula K. Le Guin".to_owned()))
            .build()
            .unwrap();

        assert!(BookQuery::new(Some("left hand".to_owned()), None, None).matches(&book));
        assert!(BookQuery::new(Some("DARK".to_owned()), Some("guin".to_owned()), None).matches(&book));
        assert!(!BookQuery::new(Some("dark".to_owned()), Some("tolkien".to_owned()), None).matches(&book));
        assert!(!BookQuery::new(None, None, Some(false)).matches(&book));
    }

    #[test]
    fn rental_filter_by_status() {
        let open = BookRental::new(1, 1, "a@x.com".to_owned(), at(1, 0), None);
        let closed = BookRental::new(2, 1, "b@x.com".to_owned(), at(1, 0), Some(at(2, 0)));

        let active = RentalFilter::new(None, RentalStatus::from_code("active"));
        assert!(active.matches(&open));
        assert!(!active.matches(&closed));

        let by_email = RentalFilter::new(Some("b@x.com".to_owned()), RentalStatus::from_code("unknown"));
        assert!(!by_email.matches(&open));
        assert!(by_email.matches(&closed));
    }
}
