use crate::error::LibraryError;
use crate::item::{
    Author, Book, BookBuilder, BookQuery, BookRental, BookRepository, Language, NewRental, RentalFilter, RentalRecord,
    RentalRepository, RentalStatus, RepositoryError, Wishlist, WishlistRepository,
};
use crate::lending::{LedgerSession, LendingStore};
use crate::page::{Page, PageRequest};
use chrono::NaiveDateTime;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::result::DatabaseErrorKind;
use diesel::debug_query;
use r2d2::{Pool, PooledConnection};
use std::collections::HashMap;
use tracing::{debug, enabled};

mod schema;

use schema::library::{author, book, book_author, book_rental, language, wishlist, wishlist_book};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

impl From<diesel::result::Error> for RepositoryError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                RepositoryError::UniqueViolation(info.message().to_owned())
            }
            e => RepositoryError::SqlExecuteError(e.to_string()),
        }
    }
}

impl From<diesel::result::Error> for LibraryError {
    fn from(e: diesel::result::Error) -> Self {
        LibraryError::Repository(e.into())
    }
}

impl From<r2d2::Error> for RepositoryError {
    fn from(e: r2d2::Error) -> Self {
        RepositoryError::ConnectError(e.to_string())
    }
}

fn sql_debugging<T>(sql: T) -> T
where
    T: diesel::query_builder::QueryFragment<Pg>,
{
    if enabled!(tracing::Level::DEBUG) {
        let debug_str = debug_query::<Pg, _>(&sql).to_string();
        debug!("SQL: {}", debug_str);
    }
    sql
}

/// ILIKE 검색에 사용할 부분 일치 패턴. 검색어의 와일드카드 문자는 일반 문자로 취급한다.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookEntity {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub publication_year: i32,
    pub language_id: Option<i64>,
    pub is_available: bool,
    pub amazon_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl BookEntity {
    fn to_domain_builder(&self) -> BookBuilder {
        let mut builder = Book::builder()
            .id(self.id as u64)
            .isbn(self.isbn.clone())
            .title(self.title.clone())
            .publication_year(self.publication_year)
            .is_available(self.is_available)
            .created_at(self.created_at)
            .updated_at(self.updated_at);

        if let Some(amazon_id) = &self.amazon_id {
            builder = builder.amazon_id(amazon_id.clone());
        }
        builder
    }
}

#[derive(Insertable)]
#[diesel(table_name = book)]
pub struct NewBookEntity<'a> {
    pub id: i64,
    pub isbn: &'a str,
    pub title: &'a str,
    pub publication_year: i32,
    pub language_id: Option<i64>,
    pub is_available: bool,
    pub amazon_id: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewBookEntity<'a> {
    pub fn from(b: &'a Book, language_id: Option<i64>, now: NaiveDateTime) -> Self {
        Self {
            id: b.id() as i64,
            isbn: b.isbn(),
            title: b.title(),
            publication_year: b.publication_year(),
            language_id,
            is_available: b.is_available(),
            amazon_id: b.amazon_id(),
            created_at: b.created_at().unwrap_or(now),
            updated_at: b.updated_at().unwrap_or(now),
        }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = author)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuthorEntity {
    pub id: i64,
    pub name: String,
}

impl AuthorEntity {
    fn to_domain(&self) -> Author {
        Author::new(self.id as u64, self.name.clone())
    }
}

#[derive(Insertable)]
#[diesel(table_name = author)]
pub struct NewAuthorEntity<'a> {
    pub name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = language)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LanguageEntity {
    pub id: i64,
    pub name: String,
}

impl LanguageEntity {
    fn to_domain(&self) -> Language {
        Language::new(self.id as u64, self.name.clone())
    }
}

#[derive(Insertable)]
#[diesel(table_name = language)]
pub struct NewLanguageEntity<'a> {
    pub name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = book_author)]
pub struct BookAuthorEntity {
    pub book_id: i64,
    pub author_id: i64,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = book_rental)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RentalEntity {
    pub id: i64,
    pub book_id: i64,
    pub borrower_email: String,
    pub borrowed_at: NaiveDateTime,
    pub returned_at: Option<NaiveDateTime>,
}

impl RentalEntity {
    fn to_domain(&self) -> BookRental {
        BookRental::new(
            self.id as u64,
            self.book_id as u64,
            self.borrower_email.clone(),
            self.borrowed_at,
            self.returned_at,
        )
    }
}

#[derive(Insertable)]
#[diesel(table_name = book_rental)]
pub struct NewRentalEntity<'a> {
    pub book_id: i64,
    pub borrower_email: &'a str,
    pub borrowed_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = wishlist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WishlistEntity {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = wishlist)]
pub struct NewWishlistEntity<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = wishlist_book)]
pub struct WishlistBookEntity {
    pub wishlist_id: i64,
    pub book_id: i64,
}

/// 도서 엔티티에 저자와 언어 정보를 채워 도메인으로 변환한다.
fn load_books(conn: &mut PgConnection, entities: Vec<BookEntity>) -> Result<Vec<Book>, RepositoryError> {
    if entities.is_empty() {
        return Ok(vec![]);
    }

    let ids = entities.iter().map(|e| e.id).collect::<Vec<_>>();
    let authors: Vec<(i64, AuthorEntity)> = sql_debugging(book_author::table
        .inner_join(author::table)
        .filter(book_author::book_id.eq_any(&ids))
        .order(author::id.asc())
        .select((book_author::book_id, AuthorEntity::as_select())))
        .load(conn)?;

    let language_ids = entities.iter().filter_map(|e| e.language_id).collect::<Vec<_>>();
    let languages: Vec<LanguageEntity> = sql_debugging(language::table
        .filter(language::id.eq_any(&language_ids))
        .select(LanguageEntity::as_select()))
        .load(conn)?;

    let mut authors_by_book: HashMap<i64, Vec<Author>> = HashMap::new();
    for (book_id, entity) in authors {
        authors_by_book.entry(book_id).or_default().push(entity.to_domain());
    }
    let languages = languages.into_iter()
        .map(|l| (l.id, l.to_domain()))
        .collect::<HashMap<_, _>>();

    entities.into_iter()
        .map(|entity| {
            let mut builder = entity.to_domain_builder();
            if let Some(l) = entity.language_id.and_then(|id| languages.get(&id)) {
                builder = builder.language(l.clone());
            }
            for a in authors_by_book.remove(&entity.id).unwrap_or_default() {
                builder = builder.add_author(a);
            }
            builder.build().map_err(RepositoryError::from)
        })
        .collect()
}

fn load_book(conn: &mut PgConnection, entity: BookEntity) -> Result<Book, RepositoryError> {
    let id = entity.id;
    load_books(conn, vec![entity])?
        .into_iter()
        .next()
        .ok_or_else(|| RepositoryError::ConvertError(format!("book {} could not be loaded", id)))
}

fn load_wishlist(conn: &mut PgConnection, entity: WishlistEntity) -> Result<Wishlist, RepositoryError> {
    let entities: Vec<BookEntity> = sql_debugging(wishlist_book::table
        .inner_join(book::table)
        .filter(wishlist_book::wishlist_id.eq(entity.id))
        .order(book::id.asc())
        .select(BookEntity::as_select()))
        .load(conn)?;
    let books = load_books(conn, entities)?;

    Ok(Wishlist::new(entity.id as u64, entity.email, entity.name, books))
}

fn filtered_books(query: &BookQuery) -> book::BoxedQuery<'static, Pg> {
    let mut statement = book::table.into_boxed();

    if let Some(title) = query.title() {
        statement = statement.filter(book::title.ilike(like_pattern(title)));
    }
    if let Some(name) = query.author() {
        let book_ids = book_author::table
            .inner_join(author::table)
            .filter(author::name.ilike(like_pattern(name)))
            .select(book_author::book_id);
        statement = statement.filter(book::id.eq_any(book_ids));
    }
    if let Some(is_available) = query.is_available() {
        statement = statement.filter(book::is_available.eq(is_available));
    }
    statement
}

fn author_or_create(conn: &mut PgConnection, name: &str, now: NaiveDateTime) -> Result<i64, RepositoryError> {
    sql_debugging(diesel::insert_into(author::table)
        .values(NewAuthorEntity { name, created_at: now, updated_at: now })
        .on_conflict(author::name)
        .do_nothing())
        .execute(conn)?;

    let id = author::table
        .filter(author::name.eq(name))
        .select(author::id)
        .first::<i64>(conn)?;
    Ok(id)
}

fn language_or_create(conn: &mut PgConnection, name: &str, now: NaiveDateTime) -> Result<i64, RepositoryError> {
    sql_debugging(diesel::insert_into(language::table)
        .values(NewLanguageEntity { name, created_at: now, updated_at: now })
        .on_conflict(language::name)
        .do_nothing())
        .execute(conn)?;

    let id = language::table
        .filter(language::name.eq(name))
        .select(language::id)
        .first::<i64>(conn)?;
    Ok(id)
}

/// PostgreSQL 저장소
#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool,
}

impl DieselRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn connection(&self) -> Result<DbConnection, RepositoryError> {
        Ok(self.pool.get()?)
    }
}

impl BookRepository for DieselRepository {
    fn find_by_id(&self, id: u64) -> Result<Option<Book>, RepositoryError> {
        let mut conn = self.connection()?;
        let entity = sql_debugging(book::table
            .find(id as i64)
            .select(BookEntity::as_select()))
            .first(&mut conn)
            .optional()?;

        entity.map(|e| load_book(&mut conn, e)).transpose()
    }

    fn search(&self, query: &BookQuery, page: &PageRequest) -> Result<Page<Book>, RepositoryError> {
        let mut conn = self.connection()?;

        let count: i64 = sql_debugging(filtered_books(query).count())
            .get_result(&mut conn)?;
        let entities: Vec<BookEntity> = sql_debugging(filtered_books(query)
            .order((book::created_at.desc(), book::id.desc()))
            .limit(page.size() as i64)
            .offset(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .select(BookEntity::as_select()))
            .load(&mut conn)?;

        let books = load_books(&mut conn, entities)?;
        Ok(Page::new(count as u64, *page, books))
    }

    fn save_book(&self, b: &Book) -> Result<Book, RepositoryError> {
        let mut pooled = self.connection()?;
        let conn: &mut PgConnection = &mut pooled;
        let id = b.id() as i64;
        let now = chrono::Local::now().naive_local();

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let author_ids = b.authors().iter()
                .map(|a| author_or_create(conn, a.name(), now))
                .collect::<Result<Vec<_>, _>>()?;

            let exists = book::table
                .find(id)
                .select(book::id)
                .first::<i64>(conn)
                .optional()?;
            if exists.is_none() {
                let language_id = b.language()
                    .map(|l| language_or_create(conn, l.name(), now))
                    .transpose()?;
                sql_debugging(diesel::insert_into(book::table)
                    .values(NewBookEntity::from(b, language_id, now)))
                    .execute(conn)?;
            }

            diesel::delete(book_author::table.filter(book_author::book_id.eq(id)))
                .execute(conn)?;
            let links = author_ids.into_iter()
                .map(|author_id| BookAuthorEntity { book_id: id, author_id })
                .collect::<Vec<_>>();
            if !links.is_empty() {
                sql_debugging(diesel::insert_into(book_author::table)
                    .values(links)
                    .on_conflict_do_nothing())
                    .execute(conn)?;
            }

            let entity = book::table
                .find(id)
                .select(BookEntity::as_select())
                .first(conn)?;
            load_book(conn, entity)
        })
    }

    fn update_availability(&self, id: u64, is_available: bool, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError> {
        let mut conn = self.connection()?;
        let entity = sql_debugging(diesel::update(book::table.find(id as i64))
            .set((book::is_available.eq(is_available), book::updated_at.eq(at)))
            .returning(BookEntity::as_select()))
            .get_result(&mut conn)
            .optional()?;

        entity.map(|e| load_book(&mut conn, e)).transpose()
    }

    fn update_amazon_id(&self, id: u64, amazon_id: &str, at: NaiveDateTime) -> Result<Option<Book>, RepositoryError> {
        let mut conn = self.connection()?;
        let entity = sql_debugging(diesel::update(book::table.find(id as i64))
            .set((book::amazon_id.eq(amazon_id), book::updated_at.eq(at)))
            .returning(BookEntity::as_select()))
            .get_result(&mut conn)
            .optional()?;

        entity.map(|e| load_book(&mut conn, e)).transpose()
    }
}

impl RentalRepository for DieselRepository {
    fn find_rentals(&self, filter: &RentalFilter) -> Result<Vec<RentalRecord>, RepositoryError> {
        let mut conn = self.connection()?;
        let mut statement = book_rental::table
            .inner_join(book::table)
            .into_boxed();

        if let Some(email) = filter.email() {
            statement = statement.filter(book_rental::borrower_email.eq(email.to_owned()));
        }
        match filter.status() {
            Some(RentalStatus::Active) => statement = statement.filter(book_rental::returned_at.is_null()),
            Some(RentalStatus::Returned) => statement = statement.filter(book_rental::returned_at.is_not_null()),
            None => {}
        }

        let rows: Vec<(RentalEntity, String)> = sql_debugging(statement
            .order((book_rental::borrowed_at.desc(), book_rental::id.desc()))
            .select((RentalEntity::as_select(), book::title)))
            .load(&mut conn)?;

        Ok(rows.into_iter()
            .map(|(rental, title)| RentalRecord::new(rental.to_domain(), title))
            .collect())
    }
}

impl WishlistRepository for DieselRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<Wishlist>, RepositoryError> {
        let mut conn = self.connection()?;
        let entity = sql_debugging(wishlist::table
            .filter(wishlist::email.eq(email))
            .order(wishlist::id.asc())
            .select(WishlistEntity::as_select()))
            .first(&mut conn)
            .optional()?;

        entity.map(|e| load_wishlist(&mut conn, e)).transpose()
    }

    fn add_book(&self, email: &str, name: &str, book_id: u64, at: NaiveDateTime) -> Result<Wishlist, RepositoryError> {
        let mut pooled = self.connection()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            sql_debugging(diesel::insert_into(wishlist::table)
                .values(NewWishlistEntity { email, name, created_at: at, updated_at: at })
                .on_conflict((wishlist::email, wishlist::name))
                .do_nothing())
                .execute(conn)?;
            let entity = wishlist::table
                .filter(wishlist::email.eq(email).and(wishlist::name.eq(name)))
                .select(WishlistEntity::as_select())
                .first(conn)?;

            sql_debugging(diesel::insert_into(wishlist_book::table)
                .values(WishlistBookEntity { wishlist_id: entity.id, book_id: book_id as i64 })
                .on_conflict_do_nothing())
                .execute(conn)?;
            diesel::update(wishlist::table.find(entity.id))
                .set(wishlist::updated_at.eq(at))
                .execute(conn)?;

            load_wishlist(conn, entity)
        })
    }

    fn remove_book(&self, wishlist_id: u64, book_id: u64, at: NaiveDateTime) -> Result<Wishlist, RepositoryError> {
        let mut pooled = self.connection()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            sql_debugging(diesel::delete(wishlist_book::table
                .filter(wishlist_book::wishlist_id.eq(wishlist_id as i64))
                .filter(wishlist_book::book_id.eq(book_id as i64))))
                .execute(conn)?;
            let entity = sql_debugging(diesel::update(wishlist::table.find(wishlist_id as i64))
                .set(wishlist::updated_at.eq(at))
                .returning(WishlistEntity::as_select()))
                .get_result(conn)?;

            load_wishlist(conn, entity)
        })
    }
}

/// 트랜잭션이 열린 커넥션 위에서 동작하는 대여 기록 세션
struct PgLedgerSession<'c> {
    conn: &'c mut PgConnection,
}

impl LedgerSession for PgLedgerSession<'_> {
    fn lock_book(&mut self, book_id: u64) -> Result<Option<Book>, RepositoryError> {
        let entity = sql_debugging(book::table
            .find(book_id as i64)
            .for_update()
            .select(BookEntity::as_select()))
            .first(self.conn)
            .optional()?;

        entity.map(|e| load_book(self.conn, e)).transpose()
    }

    fn find_open_rental(&mut self, book_id: u64, email: &str) -> Result<Option<BookRental>, RepositoryError> {
        let entity = sql_debugging(book_rental::table
            .filter(book_rental::book_id.eq(book_id as i64))
            .filter(book_rental::borrower_email.eq(email))
            .filter(book_rental::returned_at.is_null())
            .order(book_rental::id.desc())
            .select(RentalEntity::as_select()))
            .first(self.conn)
            .optional()?;

        Ok(entity.map(|e| e.to_domain()))
    }

    fn save_availability(&mut self, book_id: u64, is_available: bool, at: NaiveDateTime) -> Result<(), RepositoryError> {
        let updated = sql_debugging(diesel::update(book::table.find(book_id as i64))
            .set((book::is_available.eq(is_available), book::updated_at.eq(at))))
            .execute(self.conn)?;

        if updated == 0 {
            return Err(RepositoryError::SqlExecuteError(format!("book {} does not exist", book_id)));
        }
        Ok(())
    }

    fn append_rental(&mut self, rental: &NewRental) -> Result<BookRental, RepositoryError> {
        let entity: RentalEntity = sql_debugging(diesel::insert_into(book_rental::table)
            .values(NewRentalEntity {
                book_id: rental.book_id as i64,
                borrower_email: rental.borrower_email,
                borrowed_at: rental.borrowed_at,
            })
            .returning(RentalEntity::as_select()))
            .get_result(self.conn)?;

        Ok(entity.to_domain())
    }

    fn close_rental(&mut self, rental_id: u64, returned_at: NaiveDateTime) -> Result<BookRental, RepositoryError> {
        let entity: RentalEntity = sql_debugging(diesel::update(book_rental::table.find(rental_id as i64))
            .set(book_rental::returned_at.eq(returned_at))
            .returning(RentalEntity::as_select()))
            .get_result(self.conn)?;

        Ok(entity.to_domain())
    }
}

impl LendingStore for DieselRepository {
    fn atomically<T, F>(&self, work: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut dyn LedgerSession) -> Result<T, LibraryError>,
    {
        let mut pooled = self.connection()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction(|conn| {
            let mut session = PgLedgerSession { conn };
            work(&mut session)
        })
    }
}
