//! Server clock
//!
//! Drift correction compares device timestamps against "server now". The
//! analysis services only ever read the clock through [`TimeProvider`] so tests
//! can pin it.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};

/// Source of the server's notion of the current instant
pub trait TimeProvider: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Calendar date of "now" as seen by a user in `zone`
    fn today_in(&self, zone: Tz) -> NaiveDate {
        self.now_utc().with_timezone(&zone).date_naive()
    }
}

/// Wall clock of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock shared between a test and the services under test
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl MockTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set_time(&self, instant: DateTime<Utc>) {
        self.update(|current| *current = instant);
    }

    pub fn advance(&self, by: Duration) {
        self.update(|current| *current += by);
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        *self
            .instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut DateTime<Utc>)) {
        let mut current = self
            .instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut current);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        self.current_time()
    }
}
