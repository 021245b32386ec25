//! Integration tests for the activity analysis engine
//!
//! Drive the analysis service end to end against in-memory collaborators and,
//! with the `sqlite` feature, against an in-memory SQLite database.


mod cache_consistency_tests;
mod conflict_notification_tests;
mod merge_scenario_tests;
#[cfg(feature = "sqlite")]
mod sqlite_store_tests;
