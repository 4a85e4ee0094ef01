use crate::error::{FieldErrors, LibraryError};
use crate::item::{Book, BookQuery, BookRepository};
use crate::lending::book_not_found;
use crate::page::{Page, PageRequest};
use crate::Clock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub const AMAZON_ID_MAX_LENGTH: usize = 50;

/// 아마존 아이디 일괄 변경 요청 항목
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AmazonIdUpdate {
    pub book_id: u64,
    pub amazon_id: String,
}

/// 아마존 아이디 변경 실패 항목
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AmazonIdFailure {
    pub book_id: u64,
    pub error: String,
}

/// 아마존 아이디 일괄 변경 결과. 각 항목은 독립적으로 처리 되며 일부만 성공 할 수 있다.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AmazonIdUpdateResult {
    pub updated: Vec<AmazonIdUpdate>,
    pub errors: Vec<AmazonIdFailure>,
}

/// 도서 목록 조회 및 관리
pub struct Catalog<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: BookRepository> Catalog<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn search(&self, query: &BookQuery, page: PageRequest) -> Result<Page<Book>, LibraryError> {
        self.store.search(query, &page)?.validate()
    }

    pub fn find(&self, book_id: u64) -> Result<Book, LibraryError> {
        self.store.find_by_id(book_id)?
            .ok_or_else(|| book_not_found(book_id))
    }

    /// 아마존 아이디를 일괄 변경한다.
    ///
    /// 요청 형식이 하나라도 올바르지 않으면 아무것도 변경 하지 않고 항목별 필드 에러를 반환한다.
    /// 형식 검사를 통과한 후에는 존재 하지 않는 도서 등 항목별 실패를 결과의 `errors`에 담는다.
    pub fn update_amazon_ids(&self, payload: &Value) -> Result<AmazonIdUpdateResult, LibraryError> {
        let updates = parse_amazon_ids(payload)?;
        let mut result = AmazonIdUpdateResult::default();

        for update in updates {
            match self.store.update_amazon_id(update.book_id, &update.amazon_id, self.clock.now()) {
                Ok(Some(_)) => result.updated.push(update),
                Ok(None) => result.errors.push(AmazonIdFailure {
                    book_id: update.book_id,
                    error: book_not_found(update.book_id).to_string(),
                }),
                Err(e) => {
                    warn!(book_id = update.book_id, "아마존 아이디를 변경 할 수 없습니다. {}", e);
                    result.errors.push(AmazonIdFailure { book_id: update.book_id, error: e.to_string() });
                }
            }
        }

        info!(updated = result.updated.len(), errors = result.errors.len(), "아마존 아이디 일괄 변경 완료");
        Ok(result)
    }
}

fn parse_amazon_ids(payload: &Value) -> Result<Vec<AmazonIdUpdate>, LibraryError> {
    let items = payload.as_array().ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.insert("non_field_errors".to_owned(), vec!["Expected a list of items.".to_owned()]);
        LibraryError::Validation(vec![errors])
    })?;

    let mut updates = Vec::with_capacity(items.len());
    let mut all_errors = Vec::with_capacity(items.len());
    let mut failed = false;

    for item in items {
        let mut errors = FieldErrors::new();
        let book_id = item.get("book_id").map_or_else(
            || Err("This field is required."),
            |v| v.as_u64().filter(|id| *id > 0).ok_or("A valid positive integer is required."),
        );
        let amazon_id = item.get("amazon_id").map_or_else(
            || Err("This field is required."),
            |v| match v.as_str().map(str::trim) {
                None => Err("Not a valid string."),
                Some("") => Err("This field may not be blank."),
                Some(s) if s.chars().count() > AMAZON_ID_MAX_LENGTH => {
                    Err("Ensure this field has no more than 50 characters.")
                }
                Some(s) => Ok(s.to_owned()),
            },
        );
        if !item.is_object() {
            errors.insert("non_field_errors".to_owned(), vec!["Invalid data. Expected a dictionary.".to_owned()]);
        }

        match (book_id, amazon_id) {
            (Ok(book_id), Ok(amazon_id)) if errors.is_empty() => {
                updates.push(AmazonIdUpdate { book_id, amazon_id });
            }
            (book_id, amazon_id) => {
                if let Err(e) = book_id {
                    errors.insert("book_id".to_owned(), vec![e.to_owned()]);
                }
                if let Err(e) = amazon_id {
                    errors.insert("amazon_id".to_owned(), vec![e.to_owned()]);
                }
                failed = true;
            }
        }
        all_errors.push(errors);
    }

    if failed {
        return Err(LibraryError::Validation(all_errors));
    }
    Ok(updates)
}
