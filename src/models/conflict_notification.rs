//! Conflict Notification Model
//!
//! The message produced when activity violates a no-go goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::activity::Activity;

/// Goal conflict message handed to the messaging collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotification {
    pub id: Uuid,

    pub user_anonymized_id: Uuid,

    pub goal_id: Uuid,

    pub activity_category_id: Uuid,

    pub activity: Activity,

    /// Visited URL for network activity; never present in buddy copies
    pub url: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ConflictNotification {
    pub fn new(
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        activity_category_id: Uuid,
        activity: Activity,
        url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_anonymized_id,
            goal_id,
            activity_category_id,
            activity,
            url,
            created_at,
        }
    }

    /// Copy suitable for buddies: same activity and category, no URL
    pub fn redacted(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: None,
            ..self.clone()
        }
    }
}
