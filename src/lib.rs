//! Activity analysis engine
//!
//! Turns categorized network hits and offline app usage into per-goal day and
//! week aggregates, and raises conflict notifications when no-go goals are
//! violated.

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::{AnalysisConfig, ConflictNotificationPolicy};
pub use database::{ActivityStore, MemoryActivityStore, StoreError};
pub use error::{AnalysisError, AnalysisResult};
pub use services::{ActivityAnalysisService, AnalysisReport, MergeOutcome};
