//! Storage layer
//!
//! The storage contract the analysis engine persists day and week activities
//! through, with an in-memory store and a SQLite store built on SQLx.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{DayActivity, WeekActivity};

pub mod memory_store;

#[cfg(feature = "sqlite")]
pub mod connection;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use memory_store::MemoryActivityStore;

#[cfg(feature = "sqlite")]
pub use connection::DatabaseManager;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteActivityStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of day and week activity aggregates
///
/// Storage is authoritative; the day activity cache only mirrors it.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Day activity with the latest date for (user, goal)
    async fn find_last_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> StoreResult<Option<DayActivity>>;

    /// Day activity for (user, goal) on `date`
    async fn find_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<DayActivity>>;

    /// Insert or replace the day activity for its (user, goal, date)
    async fn save_day_activity(&self, day: &DayActivity) -> StoreResult<()>;

    /// Week activity for (user, goal) starting on `week_start`
    async fn find_week_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        week_start: NaiveDate,
    ) -> StoreResult<Option<WeekActivity>>;

    /// Insert or replace the week activity for its (user, goal, week start)
    async fn save_week_activity(&self, week: &WeekActivity) -> StoreResult<()>;
}
