//! Goal Model
//!
//! Read-only view of a user's goal as needed by the analysis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of limit a goal imposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalKind {
    /// Any matching activity is a violation
    NoGo,
    /// Matching activity is tolerated up to a daily limit
    Budget { max_duration_minutes: u32 },
}

/// A goal referencing one activity category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub activity_category_id: Uuid,
    pub kind: GoalKind,
    /// Activity before this instant does not count against the goal
    pub active_since: DateTime<Utc>,
}

impl Goal {
    pub fn no_go(activity_category_id: Uuid, active_since: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_category_id,
            kind: GoalKind::NoGo,
            active_since,
        }
    }

    pub fn budget(
        activity_category_id: Uuid,
        max_duration_minutes: u32,
        active_since: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_category_id,
            kind: GoalKind::Budget { max_duration_minutes },
            active_since,
        }
    }

    pub fn is_no_go(&self) -> bool {
        matches!(self.kind, GoalKind::NoGo)
    }

    pub fn was_active_at(&self, instant: DateTime<Utc>) -> bool {
        self.active_since <= instant
    }
}
