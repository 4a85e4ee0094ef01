use crate::error::LibraryError;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// 페이지 요청
///
/// 페이지 번호는 1부터 시작한다. 페이지 크기가 0이거나 숫자가 아닐 경우 기본값([`DEFAULT_PAGE_SIZE`])을,
/// 최대값([`MAX_PAGE_SIZE`]) 보다 클 경우 최대값을 사용한다.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRequest {
    page: u64,
    size: u64,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        let size = match size {
            0 => DEFAULT_PAGE_SIZE,
            s => s.min(MAX_PAGE_SIZE),
        };
        Self { page: page.max(1), size }
    }

    /// 쿼리 파라미터로 전달된 페이지 정보를 해석한다. 페이지 번호가 올바르지 않으면 `NotFound`를 반환한다.
    pub fn parse(page: Option<&str>, size: Option<&str>) -> Result<Self, LibraryError> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(p) => p.parse::<u64>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(invalid_page)?,
        };
        let size = size
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self::new(page, size))
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 건너뛸 항목 수. 표현 할 수 없을 만큼 큰 페이지 번호는 `u64::MAX`로 고정 된다.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// 페이지 단위 조회 결과
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page<T> {
    count: u64,
    request: PageRequest,
    results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(count: u64, request: PageRequest, results: Vec<T>) -> Self {
        Self { count, request, results }
    }

    /// 전체 목록 중 요청한 페이지에 해당 하는 부분만 잘라낸다.
    pub fn slice(items: Vec<T>, request: PageRequest) -> Self {
        let count = items.len() as u64;
        let results = items.into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.size() as usize)
            .collect();
        Self { count, request, results }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn page(&self) -> u64 {
        self.request.page()
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// 전체 페이지 수. 결과가 없어도 첫 페이지는 존재한다.
    pub fn num_pages(&self) -> u64 {
        self.count.div_ceil(self.request.size()).max(1)
    }

    pub fn next(&self) -> Option<u64> {
        (self.page() < self.num_pages()).then(|| self.page() + 1)
    }

    pub fn previous(&self) -> Option<u64> {
        (self.page() > 1).then(|| self.page() - 1)
    }

    /// 요청한 페이지가 범위를 벗어나면 `NotFound`를 반환한다.
    pub fn validate(self) -> Result<Self, LibraryError> {
        if self.page() > self.num_pages() {
            return Err(invalid_page());
        }
        Ok(self)
    }
}

fn invalid_page() -> LibraryError {
    LibraryError::NotFound("Invalid page.".to_owned())
}
