use crate::error::LibraryError;
use crate::item::repo::Store;
use crate::item::{BookQuery, RentalFilter, RentalStatus};
use crate::page::PageRequest;
use crate::web::view::{AmazonIdsView, BookView, LendingView, PageView, RentalView, ReportView, StatisticsView};
use crate::web::{blocking, parse_body, parse_book_id, ApiError, AppState};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type Params = Query<HashMap<String, String>>;

#[derive(Debug, Default, Deserialize)]
struct EmailBody {
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AvailabilityBody {
    is_available: Option<bool>,
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str)
}

fn page_request(params: &HashMap<String, String>) -> Result<PageRequest, LibraryError> {
    PageRequest::parse(param(params, "page"), param(params, "page_size"))
}

fn parse_availability(raw: Option<&str>) -> Result<Option<bool>, LibraryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some("true" | "True" | "1") => Ok(Some(true)),
        Some("false" | "False" | "0") => Ok(Some(false)),
        Some(other) => Err(LibraryError::InvalidRequest(format!("Invalid is_available value: {}", other))),
    }
}

pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Params,
) -> Result<Json<PageView<Vec<BookView>>>, ApiError> {
    let query = BookQuery::new(
        param(&params, "title").map(str::to_owned),
        param(&params, "author").map(str::to_owned),
        parse_availability(param(&params, "is_available"))?,
    );
    let page_request = page_request(&params)?;

    let page = blocking(&state, move |state| state.catalog.search(&query, page_request)).await?;
    let results = page.results().iter().map(BookView::from).collect::<Vec<_>>();
    Ok(Json(PageView::of(&page, results)))
}

pub async fn retrieve<S: Store>(State(state): State<Arc<AppState<S>>>, Path(id): Path<String>) -> Result<Json<BookView>, ApiError> {
    let book_id = parse_book_id(&id)?;
    let book = blocking(&state, move |state| state.catalog.find(book_id)).await?;
    Ok(Json(BookView::from(&book)))
}

pub async fn change_availability<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<BookView>, ApiError> {
    let book_id = parse_book_id(&id)?;
    let body: AvailabilityBody = parse_body(&body)?;

    let book = blocking(&state, move |state| state.lending.change_availability(book_id, body.is_available)).await?;
    Ok(Json(BookView::from(&book)))
}

pub async fn borrow<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<LendingView>, ApiError> {
    let book_id = parse_book_id(&id)?;
    let body: EmailBody = parse_body(&body)?;

    let (rental, book) = blocking(&state, move |state| {
        let rental = state.lending.borrow(book_id, body.email.as_deref())?;
        let book = state.catalog.find(book_id)?;
        Ok((rental, book))
    }).await?;

    let now = state.clock.now();
    Ok(Json(LendingView {
        message: "Book borrowed successfully",
        rental: RentalView::new(&rental, book.title(), now),
        book: BookView::from(&book),
    }))
}

pub async fn return_book<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<LendingView>, ApiError> {
    let book_id = parse_book_id(&id)?;
    let body: EmailBody = parse_body(&body)?;

    let (rental, book) = blocking(&state, move |state| {
        let rental = state.lending.return_book(book_id, body.email.as_deref())?;
        let book = state.catalog.find(book_id)?;
        Ok((rental, book))
    }).await?;

    let now = state.clock.now();
    Ok(Json(LendingView {
        message: "Book returned successfully",
        rental: RentalView::new(&rental, book.title(), now),
        book: BookView::from(&book),
    }))
}

pub async fn rental_report<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Params,
) -> Result<Json<PageView<ReportView>>, ApiError> {
    let filter = RentalFilter::new(
        param(&params, "email").map(|e| e.trim().to_owned()),
        param(&params, "status").and_then(RentalStatus::from_code),
    );
    let page_request = page_request(&params)?;

    let report = blocking(&state, move |state| state.ledger.report(&filter, page_request)).await?;
    let history = report.history();
    let results = ReportView {
        statistics: StatisticsView::from(report.statistics()),
        rental_history: history.results().iter()
            .map(|r| RentalView::new(r.rental(), r.book_title(), report.generated_at()))
            .collect(),
    };
    Ok(Json(PageView::of(history, results)))
}

pub async fn update_amazon_ids<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<Json<AmazonIdsView>, ApiError> {
    let payload: Value = parse_body(&body)?;
    let result = blocking(&state, move |state| state.catalog.update_amazon_ids(&payload)).await?;
    Ok(Json(AmazonIdsView::from(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_query_values() {
        assert_eq!(parse_availability(None).unwrap(), None);
        assert_eq!(parse_availability(Some("True")).unwrap(), Some(true));
        assert_eq!(parse_availability(Some("0")).unwrap(), Some(false));
        assert!(parse_availability(Some("maybe")).is_err());
    }
}
