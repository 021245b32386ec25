//! Models module
//!
//! Data model of the activity analysis engine.

pub mod activity;
pub mod activity_events;
pub mod conflict_notification;
pub mod day_activity;
pub mod goal;
pub mod user_anonymized;
pub mod week_activity;

// Re-export commonly used types
pub use activity::Activity;
pub use activity_events::{AppActivity, AppActivityBatch, NetworkActivityEvent, NormalizedEvent};
pub use conflict_notification::ConflictNotification;
pub use day_activity::DayActivity;
pub use goal::{Goal, GoalKind};
pub use user_anonymized::{BuddyAnonymized, BuddyStatus, UserAnonymized};
pub use week_activity::WeekActivity;
