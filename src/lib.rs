use chrono::NaiveDateTime;

pub mod catalog;
pub mod configs;
pub mod error;
pub mod item;
pub mod lending;
pub mod page;
pub mod rental;
pub mod web;
pub mod wishlist;

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 로컬 타임존 기준 현재 시각
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::item::{Author, Book, Language};
    use crate::Clock;
    use chrono::NaiveDateTime;
    use parking_lot::Mutex;

    pub struct FixedClock {
        now: Mutex<NaiveDateTime>,
    }

    impl FixedClock {
        pub fn at(s: &str) -> Self {
            let now = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap();
            Self { now: Mutex::new(now) }
        }

        pub fn advance_days(&self, days: i64) {
            let mut now = self.now.lock();
            *now += chrono::Duration::days(days);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            *self.now.lock()
        }
    }

    const ISBNS: [&str; 5] = [
        "9780306406157",
        "9781861972712",
        "9780140449136",
        "9780262033848",
        "9780131103627",
    ];

    pub fn fixture_book(id: u64, available: bool) -> Book {
        Book::builder()
            .id(id)
            .isbn(ISBNS[(id as usize - 1) % ISBNS.len()].to_owned())
            .title(format!("Test Book {}", id))
            .publication_year(2025)
            .language(Language::new(0, "eng".to_owned()))
            .add_author(Author::new(0, "Test Author".to_owned()))
            .is_available(available)
            .build()
            .unwrap()
    }
}
