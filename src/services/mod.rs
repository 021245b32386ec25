//! Services module for the activity analysis engine
//!
//! Contains the analysis pipeline: time normalization, goal matching, the
//! day activity cache, the merge engine, week aggregation and conflict
//! notification, plus the service that orchestrates them.

pub mod activity_analysis_service;
pub mod activity_merge_service;
pub mod conflict_notifier;
pub mod day_activity_cache;
pub mod goal_matcher;
pub mod time_normalizer;
pub mod time_provider;
pub mod timezone_service;
pub mod week_activity_builder;

// Re-export commonly used services
pub use activity_analysis_service::{ActivityAnalysisService, AnalysisReport, GoalOutcome};
pub use activity_merge_service::{ActivityMergeService, CacheLookup, MergeOutcome, MergeResult};
pub use conflict_notifier::{ConflictNotifier, MessageDispatcher};
pub use day_activity_cache::{CacheKey, CacheSlot, DayActivityCache};
pub use goal_matcher::{GoalLookup, GoalMatcher};
pub use time_normalizer::TimeNormalizer;
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};
pub use timezone_service::{TimezoneError, TimezoneResult, TimezoneService};
pub use week_activity_builder::WeekActivityBuilder;
