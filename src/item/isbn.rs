use crate::item::ItemError;
use regex::Regex;
use std::sync::LazyLock;

static ISBN_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{9}[0-9X]|[0-9]{13})$").expect("isbn format regex")
});

/// ISBN에서 하이픈과 공백을 제거하고 ISBN-10 혹은 ISBN-13 체크섬을 검증한다.
pub fn normalize(raw: &str) -> Result<String, ItemError> {
    let normalized: String = raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !ISBN_FORMAT.is_match(&normalized) {
        return Err(ItemError::InvalidIsbn(raw.to_owned()));
    }

    let valid = if normalized.len() == 10 {
        is_valid_isbn10(&normalized)
    } else {
        is_valid_isbn13(&normalized)
    };

    if valid {
        Ok(normalized)
    } else {
        Err(ItemError::InvalidIsbn(raw.to_owned()))
    }
}

fn is_valid_isbn10(isbn: &str) -> bool {
    let sum = isbn.chars()
        .enumerate()
        .map(|(i, c)| {
            let digit = if c == 'X' && i == 9 { Some(10) } else { c.to_digit(10) };
            digit.map(|d| (10 - i as u32) * d)
        })
        .sum::<Option<u32>>();
    sum.is_some_and(|sum| sum % 11 == 0)
}

fn is_valid_isbn13(isbn: &str) -> bool {
    let sum = isbn.chars()
        .enumerate()
        .map(|(i, c)| {
            let weight = if i % 2 == 0 { 1 } else { 3 };
            c.to_digit(10).map(|d| weight * d)
        })
        .sum::<Option<u32>>();
    sum.is_some_and(|sum| sum % 10 == 0)
}
