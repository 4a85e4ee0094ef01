use crate::error::LibraryError;
use crate::item::{RentalFilter, RentalRecord, RentalRepository};
use crate::page::{Page, PageRequest};
use crate::Clock;
use chrono::{Datelike, NaiveDateTime};
use std::sync::Arc;

/// 대여 통계
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RentalStatistics {
    pub total_rentals: u64,

    /// 반납 되지 않은 대여 수
    pub currently_rented: u64,

    pub rentals_this_year: u64,
    pub rentals_this_month: u64,

    /// `now`가 포함된 ISO 주의 대여 수
    pub rentals_this_week: u64,

    /// 반납 완료된 대여의 평균 대여 기간(일, 내림). 반납 완료된 대여가 없다면 0
    pub average_rental_days: i64,
}

impl RentalStatistics {
    pub fn collect(records: &[RentalRecord], now: NaiveDateTime) -> Self {
        let mut statistics = RentalStatistics::default();
        let mut completed = 0i64;
        let mut completed_seconds = 0i64;

        for record in records {
            let rental = record.rental();
            let borrowed_at = rental.borrowed_at();
            statistics.total_rentals += 1;

            match rental.returned_at() {
                None => statistics.currently_rented += 1,
                Some(returned_at) => {
                    completed += 1;
                    completed_seconds += (returned_at - borrowed_at).num_seconds();
                }
            }

            if borrowed_at.year() == now.year() {
                statistics.rentals_this_year += 1;
                if borrowed_at.month() == now.month() {
                    statistics.rentals_this_month += 1;
                }
            }
            if borrowed_at.iso_week() == now.iso_week() {
                statistics.rentals_this_week += 1;
            }
        }

        if completed > 0 {
            statistics.average_rental_days = (completed_seconds / completed).div_euclid(86_400);
        }
        statistics
    }
}

/// 대여 리포트. 통계와 대여일 역순의 대여 기록 페이지로 구성된다.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RentalReport {
    statistics: RentalStatistics,
    history: Page<RentalRecord>,
    generated_at: NaiveDateTime,
}

impl RentalReport {
    pub fn statistics(&self) -> &RentalStatistics {
        &self.statistics
    }

    pub fn history(&self) -> &Page<RentalRecord> {
        &self.history
    }

    /// 리포트 생성 시각. 반납 되지 않은 대여의 기간은 이 시각을 기준으로 계산한다.
    pub fn generated_at(&self) -> NaiveDateTime {
        self.generated_at
    }
}

/// 대여 기록 조회
pub struct RentalLedger<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: RentalRepository> RentalLedger<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn report(&self, filter: &RentalFilter, page: PageRequest) -> Result<RentalReport, LibraryError> {
        let now = self.clock.now();
        let records = self.store.find_rentals(filter)?;
        let statistics = RentalStatistics::collect(&records, now);
        let history = Page::slice(records, page).validate()?;

        Ok(RentalReport { statistics, history, generated_at: now })
    }
}
