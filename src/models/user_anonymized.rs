//! Anonymized User Model
//!
//! The pseudonymous identity all activity and goal data is keyed by.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::models::goal::Goal;

/// State of a buddy relationship from the sending user's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuddyStatus {
    Requested,
    Accepted,
    Rejected,
}

/// A buddy as seen from the anonymized side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyAnonymized {
    pub id: Uuid,

    /// Where messages for this buddy are delivered
    pub anonymous_destination_id: Uuid,

    pub sending_status: BuddyStatus,
}

impl BuddyAnonymized {
    pub fn accepted(anonymous_destination_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            anonymous_destination_id,
            sending_status: BuddyStatus::Accepted,
        }
    }
}

/// Anonymized user with the data the analysis engine reads
#[derive(Debug, Clone, PartialEq)]
pub struct UserAnonymized {
    pub id: Uuid,

    pub time_zone: Tz,

    /// Goals as loaded with the user; [`crate::services::GoalLookup`]
    /// implementations may serve them from here
    pub goals: Vec<Goal>,

    pub buddies: Vec<BuddyAnonymized>,

    /// Where messages for this user are delivered
    pub anonymous_destination_id: Uuid,

    /// Latest day activity was seen for; kept by the host from analysis reports
    pub last_monitored_activity_date: Option<NaiveDate>,
}

impl UserAnonymized {
    pub fn new(time_zone: Tz) -> Self {
        Self {
            id: Uuid::new_v4(),
            time_zone,
            goals: Vec::new(),
            buddies: Vec::new(),
            anonymous_destination_id: Uuid::new_v4(),
            last_monitored_activity_date: None,
        }
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn with_buddy(mut self, buddy: BuddyAnonymized) -> Self {
        self.buddies.push(buddy);
        self
    }

    /// Move the last monitored date forward to `date`; returns whether it changed
    pub fn record_monitored_activity(&mut self, date: NaiveDate) -> bool {
        if self.last_monitored_activity_date >= Some(date) {
            return false;
        }
        self.last_monitored_activity_date = Some(date);
        true
    }

    pub fn accepted_buddies(&self) -> impl Iterator<Item = &BuddyAnonymized> {
        self.buddies
            .iter()
            .filter(|buddy| buddy.sending_status == BuddyStatus::Accepted)
    }
}
