//! In-memory activity store
//!
//! Keeps aggregates in ordered maps behind async locks. Used for embedding the
//! engine without a database and as the store in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActivityStore, StoreResult};
use crate::models::{DayActivity, WeekActivity};

type AggregateKey = (Uuid, Uuid, NaiveDate);

/// Every key of (user, goal), any date
fn key_range(user_anonymized_id: Uuid, goal_id: Uuid) -> RangeInclusive<AggregateKey> {
    (user_anonymized_id, goal_id, NaiveDate::MIN)..=(user_anonymized_id, goal_id, NaiveDate::MAX)
}

/// Activity store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    days: RwLock<BTreeMap<AggregateKey, DayActivity>>,
    weeks: RwLock<BTreeMap<AggregateKey, WeekActivity>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All day activities of (user, goal) in date order
    pub async fn day_activities(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> Vec<DayActivity> {
        let days = self.days.read().await;
        days.range(key_range(user_anonymized_id, goal_id))
            .map(|(_, day)| day.clone())
            .collect()
    }

    /// All week activities of (user, goal) in week order
    pub async fn week_activities(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> Vec<WeekActivity> {
        let weeks = self.weeks.read().await;
        weeks
            .range(key_range(user_anonymized_id, goal_id))
            .map(|(_, week)| week.clone())
            .collect()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn find_last_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> StoreResult<Option<DayActivity>> {
        let days = self.days.read().await;
        Ok(days
            .range(key_range(user_anonymized_id, goal_id))
            .next_back()
            .map(|(_, day)| day.clone()))
    }

    async fn find_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<DayActivity>> {
        let days = self.days.read().await;
        Ok(days.get(&(user_anonymized_id, goal_id, date)).cloned())
    }

    async fn save_day_activity(&self, day: &DayActivity) -> StoreResult<()> {
        let mut days = self.days.write().await;
        days.insert((day.user_anonymized_id, day.goal_id, day.date), day.clone());
        Ok(())
    }

    async fn find_week_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        week_start: NaiveDate,
    ) -> StoreResult<Option<WeekActivity>> {
        let weeks = self.weeks.read().await;
        Ok(weeks.get(&(user_anonymized_id, goal_id, week_start)).cloned())
    }

    async fn save_week_activity(&self, week: &WeekActivity) -> StoreResult<()> {
        let mut weeks = self.weeks.write().await;
        let key = (week.user_anonymized_id, week.goal_id, week.week_start);
        weeks.insert(key, week.clone());
        Ok(())
    }
}
