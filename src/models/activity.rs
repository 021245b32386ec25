//! Activity Model
//!
//! A single continuous usage interval inside a day activity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One usage interval, owned by exactly one `DayActivity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier for the activity
    pub id: Uuid,

    /// Start of the interval
    pub start_time: DateTime<Utc>,

    /// End of the interval
    pub end_time: DateTime<Utc>,

    /// Device that reported the activity, when known
    pub device_id: Option<Uuid>,

    /// Application name for app activities
    pub app: Option<String>,
}

impl Activity {
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        device_id: Option<Uuid>,
        app: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            device_id,
            app,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Whole minutes covered by the activity
    pub fn duration_minutes(&self) -> u32 {
        u32::try_from(self.duration().num_minutes()).unwrap_or(0)
    }

    /// Move the end of the interval forward
    pub(crate) fn extend_to(&mut self, end_time: DateTime<Utc>) {
        if end_time > self.end_time {
            self.end_time = end_time;
        }
    }
}
