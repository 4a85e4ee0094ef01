use crate::item::RepositoryError;
use std::collections::BTreeMap;
use thiserror::Error;

/// 필드 이름 - 에러 메시지 목록
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 에러 종류
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    InvalidRequest,
    Conflict,
    NotFound,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Internal => "internal",
        }
    }
}

/// 서비스 계층에서 발생 하는 에러
#[derive(Debug, Error)]
pub enum LibraryError {
    /// 필수 값 누락 혹은 잘못된 요청
    #[error("{0}")]
    InvalidRequest(String),

    /// 도서 상태가 요청을 처리 할 수 없는 상태 (ex. 이미 대여중인 도서 대여)
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// 해당 이메일로 대여중인 기록이 없음. 도서가 대여중이더라도 다른 이메일로는 반납 할 수 없다.
    #[error("No active rental found for book {book_id} and email {email}")]
    NoOpenRental { book_id: u64, email: String },

    /// 요청 항목별 필드 에러 (요청 목록과 같은 순서)
    #[error("validation failed")]
    Validation(Vec<FieldErrors>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LibraryError::Conflict(_) => ErrorKind::Conflict,
            LibraryError::NotFound(_) | LibraryError::NoOpenRental { .. } => ErrorKind::NotFound,
            LibraryError::Validation(_) => ErrorKind::Validation,
            LibraryError::Repository(_) => ErrorKind::Internal,
        }
    }
}

/// 이메일이 비어 있지 않은지 확인하고 앞뒤 공백을 제거한다.
pub fn required_email(email: Option<&str>) -> Result<&str, LibraryError> {
    email.map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| LibraryError::InvalidRequest("Email is required".to_owned()))
}
